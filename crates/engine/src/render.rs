use core_types::Orientation;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::warn;

use crate::{EngineError, Result, RENDITION_QUALITY};

pub fn render_fill(
    original: &[u8],
    orientation: Orientation,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(EngineError::Render(format!(
            "invalid rendition size {width}x{height}"
        )));
    }

    let decoded = image::load_from_memory_with_format(original, ImageFormat::Jpeg)
        .map_err(|err| EngineError::Decode(format!("cannot decode image: {err}")))?;

    let upright = apply_orientation(decoded, orientation);
    let filled = upright.resize_to_fill(width, height, FilterType::Triangle);
    encode_jpeg(&filled)
}

/// Rotates stored pixels so that the displayed top-left corner ends up at (0, 0).
/// Unrecognized codes are left untouched.
pub fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation.code() {
        1 => img,
        3 => img.rotate180(),
        6 => img.rotate90(),
        8 => img.rotate270(),
        other => {
            warn!(orientation = other, "unknown image orientation, rendering as stored");
            img
        }
    }
}

pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, RENDITION_QUALITY)
        .encode_image(&img.to_rgb8())
        .map_err(|err| EngineError::Encode(format!("cannot encode JPEG: {err}")))?;
    Ok(out)
}
