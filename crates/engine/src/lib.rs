//! Image decoding for the gallery: identity and metadata extraction at ingestion time and
//! orientation-corrected renditions at read time.

pub mod extract;
pub mod render;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use chrono::{DateTime, Utc};
use core_types::{Image, Orientation};
use std::io::{Read, Seek};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// JPEG quality used for every rendition.
pub const RENDITION_QUALITY: u8 = 85;

#[derive(Debug, Clone, Default)]
pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }

    /// Reads identity, dimensions, orientation and capture time from `stream`.
    /// `ingested_at` becomes `created` when the file carries no usable capture time.
    pub fn extract<R: Read + Seek>(&self, stream: &mut R, ingested_at: DateTime<Utc>) -> Result<Image> {
        extract::extract(stream, ingested_at)
    }

    /// Decodes `original`, applies the orientation transform and fills `width` x `height`
    /// around the center. Returns encoded JPEG bytes.
    pub fn render_fill(
        &self,
        original: &[u8],
        orientation: Orientation,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        render::render_fill(original, orientation, width, height)
    }
}
