use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use core_types::{Orientation, IMAGE_EXTENSION};
use engine::ImageEngine;
use tracing::{debug, error};

use crate::{blob_path, open_existing, write_atomic, BlobStore, Result};

/// Edge length of the default square thumbnail.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;

/// Lazily rendered, orientation-corrected square thumbnails, persisted under their own root
/// with the same `<year>/<image_id>.jpg` layout as originals. Any size other than
/// [`DEFAULT_THUMBNAIL_SIZE`] lives under a `<size>x<size>/` subdirectory. Entries never expire.
pub struct ThumbnailCache {
    root: PathBuf,
    store: Arc<dyn BlobStore>,
    engine: ImageEngine,
    size: u32,
    locks: KeyedLocks,
    renders: AtomicU64,
}

impl ThumbnailCache {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn BlobStore>, engine: ImageEngine) -> Self {
        Self {
            root: root.into(),
            store,
            engine,
            size: DEFAULT_THUMBNAIL_SIZE,
            locks: KeyedLocks::default(),
            renders: AtomicU64::new(0),
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of cache misses rendered by this instance.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn thumbnail_path(&self, year: i32, image_id: &str) -> Result<PathBuf> {
        if self.size == DEFAULT_THUMBNAIL_SIZE {
            blob_path(&self.root, year, image_id, IMAGE_EXTENSION)
        } else {
            let sized = self.root.join(format!("{0}x{0}", self.size));
            blob_path(&sized, year, image_id, IMAGE_EXTENSION)
        }
    }

    /// Returns the cached thumbnail, rendering and persisting it first on a miss.
    ///
    /// Misses for the same cache file are serialized, so concurrent first reads render
    /// once and the rest are served from the file the first one wrote.
    pub fn read_thumbnail(
        &self,
        year: i32,
        orientation: Orientation,
        image_id: &str,
    ) -> Result<Box<dyn Read + Send>> {
        let path = self.thumbnail_path(year, image_id)?;
        if let Some(file) = open_existing(&path)? {
            debug!(image_id, path = %path.display(), "thumbnail cache hit");
            return Ok(Box::new(file));
        }

        let key = path.to_string_lossy().into_owned();
        let lock = self.locks.acquire(&key);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.fill(year, orientation, image_id, &path)
        };
        self.locks.release(&key, lock);
        result
    }

    fn fill(
        &self,
        year: i32,
        orientation: Orientation,
        image_id: &str,
        path: &Path,
    ) -> Result<Box<dyn Read + Send>> {
        if let Some(file) = open_existing(path)? {
            debug!(image_id, path = %path.display(), "thumbnail rendered by concurrent reader");
            return Ok(Box::new(file));
        }

        debug!(image_id, path = %path.display(), "thumbnail cache miss");
        let bytes = self.render(year, orientation, image_id).inspect_err(|err| {
            error!(image_id, path = %path.display(), error = %err, "thumbnail render failed");
        })?;
        write_atomic(path, &mut bytes.as_slice()).inspect_err(|err| {
            error!(image_id, path = %path.display(), error = %err, "failed to persist thumbnail");
        })?;
        self.renders.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn render(&self, year: i32, orientation: Orientation, image_id: &str) -> Result<Vec<u8>> {
        let original = self.store.read_bytes(year, image_id)?;
        Ok(self
            .engine
            .render_fill(&original, orientation, self.size, self.size)?)
    }
}

/// One mutex per in-flight key. Entries are dropped once no caller holds them.
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's reference plus ours.
        if Arc::strong_count(&lock) <= 2 {
            map.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
