//! Rebuilds catalog rows from the side-records in the photos root.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use blob_store::fs_store::{read_side_record, META_EXTENSION};
use blob_store::StoreError;
use catalog::{Catalog, CatalogError};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Side-records inserted into the catalog.
    pub restored: Vec<String>,
    /// Side-records whose image was already catalogued.
    pub existing: Vec<String>,
    pub failed: Vec<(PathBuf, RecoveryError)>,
}

/// Walks `<photos_root>/<year>/*.json` and inserts every side-record into `catalog`.
/// Images already present count as `existing`; tags are not recoverable from side-records.
pub fn recover_catalog(photos_root: &Path, catalog: &dyn Catalog) -> RecoveryReport {
    let mut report = RecoveryReport::default();

    for entry in WalkDir::new(photos_root).min_depth(2).max_depth(2) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                let path = source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| photos_root.to_path_buf());
                warn!(path = %path.display(), error = %source, "cannot walk photos root");
                report.failed.push((path.clone(), RecoveryError::Walk { path, source }));
                continue;
            }
        };
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(OsStr::to_str) != Some(META_EXTENSION)
        {
            continue;
        }

        let path = entry.into_path();
        let image = match read_side_record(&path) {
            Ok(image) => image,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable side-record");
                report.failed.push((path, err.into()));
                continue;
            }
        };

        match catalog.create_image(&image) {
            Ok(()) => report.restored.push(image.image_id),
            Err(CatalogError::Conflict(_)) => report.existing.push(image.image_id),
            Err(err) => {
                warn!(path = %path.display(), image_id = %image.image_id, error = %err, "cannot restore image");
                report.failed.push((path, err.into()));
            }
        }
    }

    info!(
        restored = report.restored.len(),
        existing = report.existing.len(),
        failed = report.failed.len(),
        "catalog recovery finished"
    );
    report
}
