use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings path unavailable")]
    MissingSettingsPath,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

pub const ENV_DATABASE: &str = "GALLERY_DATABASE";
pub const ENV_PHOTOS_DIR: &str = "GALLERY_PHOTOS_DIR";
pub const ENV_THUMBNAILS_DIR: &str = "GALLERY_THUMBNAILS_DIR";
pub const ENV_THUMBNAIL_SIZE: &str = "GALLERY_THUMBNAIL_SIZE";
pub const ENV_LOG: &str = "GALLERY_LOG";

/// Storage roots and rendering knobs for one gallery instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GallerySettings {
    /// SQLite catalog file.
    pub database: PathBuf,
    /// Root of the year-sharded originals and side-records.
    pub photos_dir: PathBuf,
    /// Root of the thumbnail cache.
    pub thumbnails_dir: PathBuf,
    /// Square edge of cached thumbnails, in pixels.
    pub thumbnail_size: u32,
    /// Default `tracing` filter directive.
    pub log_filter: String,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("/tmp/gallery/db.sqlite3"),
            photos_dir: PathBuf::from("/tmp/gallery/photos"),
            thumbnails_dir: PathBuf::from("/tmp/gallery/thumbnails"),
            thumbnail_size: 100,
            log_filter: "info".to_string(),
        }
    }
}

impl GallerySettings {
    /// Reads `settings.json` from the user config directory, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = settings_file_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: GallerySettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(settings_file_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Layers `GALLERY_*` environment variables over the current values.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit lookup.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_DATABASE) {
            self.database = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_PHOTOS_DIR) {
            self.photos_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_THUMBNAILS_DIR) {
            self.thumbnails_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_THUMBNAIL_SIZE) {
            self.thumbnail_size = value.trim().parse().map_err(|_| SettingsError::InvalidValue {
                key: ENV_THUMBNAIL_SIZE,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_LOG) {
            self.log_filter = value;
        }
        self.validate()?;
        Ok(self)
    }

    /// Creates the storage roots and the catalog's parent directory.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.photos_dir)?;
        std::fs::create_dir_all(&self.thumbnails_dir)?;
        if let Some(parent) = self.database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.thumbnail_size == 0 {
            return Err(SettingsError::InvalidValue {
                key: "thumbnail_size",
                value: self.thumbnail_size.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn settings_file_path() -> Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or(SettingsError::MissingSettingsPath)?;
    let mut path = base.home_dir().to_path_buf();
    path.push("Library");
    path.push("Preferences");
    path.push("gallery");
    path.push("settings.json");
    Ok(path)
}

#[cfg(not(target_os = "macos"))]
fn settings_file_path() -> Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or(SettingsError::MissingSettingsPath)?;
    let mut path = base.config_dir().to_path_buf();
    path.push("gallery");
    path.push("settings.json");
    Ok(path)
}
