//! Photo ingestion and retrieval over a year-sharded blob store, a thumbnail cache and a
//! SQLite catalog.

pub mod recovery;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use app_settings::{GallerySettings, SettingsError};
use blob_store::{FileStore, ThumbnailCache};
use catalog::{Catalog, CatalogError, CatalogService};
use engine::ImageEngine;
use thiserror::Error;
use tracing::info;

pub use recovery::{recover_catalog, RecoveryError, RecoveryReport};
pub use services::ingest::{IngestError, IngestOutcome, IngestReport, Ingestor};
pub use services::retrieve::{
    format_http_date, parse_http_date, Content, Rendition, RetrieveError, RetrieveRequest,
    Retrieved, Retriever,
};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Wires the stores together for one set of [`GallerySettings`].
pub struct Gallery {
    settings: GallerySettings,
    store: Arc<FileStore>,
    catalog: Arc<CatalogService>,
    thumbnails: Arc<ThumbnailCache>,
    ingestor: Ingestor,
    retriever: Retriever,
}

impl Gallery {
    /// Installs tracing with the configured filter, creates the storage roots if needed and
    /// opens the catalog.
    pub fn open(settings: GallerySettings) -> Result<Self, GalleryError> {
        telemetry::init_tracing(&settings.log_filter);
        settings.ensure_dirs()?;
        let catalog = Arc::new(CatalogService::open(&settings.database)?);
        info!(
            database = %settings.database.display(),
            photos = %settings.photos_dir.display(),
            thumbnails = %settings.thumbnails_dir.display(),
            "gallery opened"
        );
        Ok(Self::with_catalog(settings, catalog))
    }

    pub fn with_catalog(settings: GallerySettings, catalog: Arc<CatalogService>) -> Self {
        let engine = ImageEngine::new();
        let store = Arc::new(FileStore::new(&settings.photos_dir));
        let thumbnails = Arc::new(
            ThumbnailCache::new(&settings.thumbnails_dir, store.clone(), engine.clone())
                .with_size(settings.thumbnail_size),
        );
        let ingestor = Ingestor::new(engine.clone(), store.clone(), catalog.clone());
        let retriever = Retriever::new(engine, store.clone(), thumbnails.clone(), catalog.clone());
        Self {
            settings,
            store,
            catalog,
            thumbnails,
            ingestor,
            retriever,
        }
    }

    pub fn settings(&self) -> &GallerySettings {
        &self.settings
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Re-inserts catalog rows for every side-record under the photos root.
    pub fn recover(&self) -> RecoveryReport {
        recover_catalog(self.store.root(), self.catalog.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_roots_and_installs_tracing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = GallerySettings {
            database: dir.path().join("db").join("gallery.sqlite3"),
            photos_dir: dir.path().join("photos"),
            thumbnails_dir: dir.path().join("thumbnails"),
            log_filter: "gallery=debug".to_string(),
            ..GallerySettings::default()
        };
        let gallery = Gallery::open(settings).unwrap();

        assert!(gallery.settings().photos_dir.is_dir());
        assert!(gallery.settings().thumbnails_dir.is_dir());
        assert!(gallery.settings().database.is_file());
        assert!(!telemetry::init_tracing("info"));
    }
}
