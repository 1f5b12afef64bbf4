use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use core_types::{Image, ImagesOpts, Tag, TagGroup};
use tracing::debug;

use crate::db::{images, tags, CatalogDb};
use crate::{Catalog, Result};

/// SQLite-backed [`Catalog`]. One connection, serialized behind a mutex so the service can be
/// shared across request workers.
pub struct CatalogService {
    db: Mutex<CatalogDb>,
}

impl CatalogService {
    pub fn new(db: CatalogDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening catalog");
        Ok(Self::new(CatalogDb::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(CatalogDb::in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, CatalogDb> {
        // A panic mid-statement leaves no half-applied state in SQLite.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Catalog for CatalogService {
    fn create_image(&self, image: &Image) -> Result<()> {
        images::insert(&*self.db(), image)
    }

    fn create_tag(&self, tag: &Tag) -> Result<()> {
        tags::insert(&*self.db(), tag)
    }

    fn image_by_id(&self, image_id: &str) -> Result<Image> {
        images::load(&*self.db(), image_id)
    }

    fn image_tags(&self, image_id: &str) -> Result<Vec<Tag>> {
        tags::for_image(&*self.db(), image_id)
    }

    fn list_images(&self, opts: &ImagesOpts) -> Result<Vec<Image>> {
        images::list(&*self.db(), opts)
    }

    fn tag_groups(&self) -> Result<Vec<TagGroup>> {
        tags::groups(&*self.db())
    }
}
