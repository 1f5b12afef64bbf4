pub mod db;
pub mod schema;
pub mod services;

use core_types::{Image, ImagesOpts, Tag, TagGroup};
use rusqlite::ffi;
use thiserror::Error;

pub use services::catalog_service::CatalogService;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Time parse error: {0}")]
    Time(#[from] chrono::ParseError),

    #[error("Unsupported catalog version: {0}")]
    UnsupportedVersion(i64),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Classifies a raw SQLite error: an empty result is `NotFound`, a key collision is
/// `Conflict`, and a dangling reference is `NotFound` (the referenced image is missing).
pub fn cast(err: rusqlite::Error) -> CatalogError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound,
        rusqlite::Error::SqliteFailure(code, message) => match code.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                CatalogError::Conflict(message.unwrap_or_else(|| code.to_string()))
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => CatalogError::NotFound,
            _ => CatalogError::Sqlite(rusqlite::Error::SqliteFailure(code, message)),
        },
        other => CatalogError::Sqlite(other),
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        cast(err)
    }
}

/// Relational record of images and their tags.
///
/// Uniqueness of `image_id` is enforced by the store itself; callers never check before
/// inserting.
pub trait Catalog: Send + Sync {
    /// Fails with [`CatalogError::Conflict`] when the identity is already present.
    fn create_image(&self, image: &Image) -> Result<()>;

    /// Duplicates are legal. Fails with [`CatalogError::NotFound`] for an unknown image.
    fn create_tag(&self, tag: &Tag) -> Result<()>;

    fn image_by_id(&self, image_id: &str) -> Result<Image>;

    fn image_tags(&self, image_id: &str) -> Result<Vec<Tag>>;

    /// Newest first; every tag filter in `opts` must be matched.
    fn list_images(&self, opts: &ImagesOpts) -> Result<Vec<Image>>;

    fn tag_groups(&self) -> Result<Vec<TagGroup>>;
}
