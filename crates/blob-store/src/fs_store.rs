use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use core_types::{Image, IMAGE_EXTENSION};
use tracing::{debug, error};

use crate::{blob_path, io_error, open_existing, write_atomic, BlobStore, Result, StoreError};

pub const META_EXTENSION: &str = "json";

/// Filesystem [`BlobStore`]: `<root>/<year>/<image_id>.jpg` plus `<image_id>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_path(&self, year: i32, image_id: &str) -> Result<PathBuf> {
        blob_path(&self.root, year, image_id, IMAGE_EXTENSION)
    }

    pub fn meta_path(&self, year: i32, image_id: &str) -> Result<PathBuf> {
        blob_path(&self.root, year, image_id, META_EXTENSION)
    }
}

impl BlobStore for FileStore {
    fn put(&self, image: &Image, content: &mut dyn Read) -> Result<()> {
        let year = image.year();
        let original = self.original_path(year, &image.image_id)?;
        let meta = self.meta_path(year, &image.image_id)?;

        write_atomic(&original, content).inspect_err(|err| {
            error!(image_id = %image.image_id, path = %original.display(), error = %err, "failed to store original");
        })?;

        let record = Image {
            tags: Vec::new(),
            ..image.clone()
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Meta {
            path: meta.clone(),
            source,
        })?;
        write_atomic(&meta, &mut json.as_slice()).inspect_err(|err| {
            error!(image_id = %image.image_id, path = %meta.display(), error = %err, "failed to store side-record");
        })?;

        debug!(image_id = %image.image_id, path = %original.display(), "stored original");
        Ok(())
    }

    fn read(&self, year: i32, image_id: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.original_path(year, image_id)?;
        match open_existing(&path)? {
            Some(file) => Ok(Box::new(io::BufReader::new(file))),
            None => Err(StoreError::NotFound(path.display().to_string())),
        }
    }

    fn read_bytes(&self, year: i32, image_id: &str) -> Result<Vec<u8>> {
        let path = self.original_path(year, image_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn read_meta(&self, year: i32, image_id: &str) -> Result<Image> {
        let path = self.meta_path(year, image_id)?;
        read_side_record(&path)
    }
}

/// Decodes one `<image_id>.json` side-record.
pub fn read_side_record(path: &Path) -> Result<Image> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.display().to_string()))
        }
        Err(err) => return Err(io_error(path, err)),
    };
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Meta {
        path: path.to_path_buf(),
        source,
    })
}
