//! Content-addressed original storage and the derived thumbnail cache.
//!
//! Both roots share one layout: `<root>/<year>/<image_id>.<ext>`, where `year` is the four-digit
//! capture year of the image.

pub mod fs_store;
pub mod thumbnails;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use core_types::{identity, Image};
use thiserror::Error;

pub use fs_store::FileStore;
pub use thumbnails::ThumbnailCache;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed side-record {path}: {source}")]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("render failed: {0}")]
    Render(#[from] engine::EngineError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence of original bytes plus their metadata side-record.
pub trait BlobStore: Send + Sync {
    /// Writes `content` and the side-record for `image`. Re-writing identical content is safe.
    fn put(&self, image: &Image, content: &mut dyn Read) -> Result<()>;

    fn read(&self, year: i32, image_id: &str) -> Result<Box<dyn Read + Send>>;

    /// Whole original in memory, for decoding.
    fn read_bytes(&self, year: i32, image_id: &str) -> Result<Vec<u8>>;

    fn read_meta(&self, year: i32, image_id: &str) -> Result<Image>;
}

/// `<root>/<year>/<image_id>.<extension>`. Rejects identities that are not a content hash so a
/// caller-supplied id can never escape the root.
pub fn blob_path(root: &Path, year: i32, image_id: &str, extension: &str) -> Result<PathBuf> {
    if !identity::is_valid_identity(image_id) {
        return Err(StoreError::NotFound(image_id.to_string()));
    }
    Ok(root
        .join(format!("{year:04}"))
        .join(format!("{image_id}.{extension}")))
}

pub(crate) fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Opens `path`, mapping a missing file to `Ok(None)`.
pub(crate) fn open_existing(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(path, err)),
    }
}

/// Streams `content` into a temp file beside `path` and renames it into place, so readers see
/// either nothing or the complete file.
pub(crate) fn write_atomic(path: &Path, content: &mut dyn Read) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io_error(path, io::Error::other("path has no parent directory")))?;
    fs::create_dir_all(dir).map_err(|err| io_error(dir, err))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|err| io_error(dir, err))?;
    io::copy(content, &mut tmp).map_err(|err| io_error(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| io_error(tmp.path(), err))?;
    tmp.persist(path).map_err(|err| io_error(path, err.error))?;
    Ok(())
}
