use std::io::{BufReader, Read, Seek, SeekFrom};

use chrono::{DateTime, NaiveDateTime, Utc};
use core_types::identity::content_id;
use core_types::{Image, Orientation};
use exif::{Exif, In, Reader, Tag, Value as ExifValue};
use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};

use crate::{EngineError, Result};

/// Capture timestamp layout used by EXIF `DateTimeOriginal`. Local time, no zone.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Embedded capture metadata. Both fields are optional; absence is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMetadata {
    pub orientation: Option<Orientation>,
    pub captured_at: Option<DateTime<Utc>>,
}

pub fn extract<R: Read + Seek>(stream: &mut R, ingested_at: DateTime<Utc>) -> Result<Image> {
    stream.seek(SeekFrom::Start(0))?;
    let (width, height) = read_dimensions(stream)?;

    stream.seek(SeekFrom::Start(0))?;
    let image_id = content_id(stream)?;

    stream.seek(SeekFrom::Start(0))?;
    let capture = read_capture_metadata(stream, &image_id);
    stream.seek(SeekFrom::Start(0))?;

    Ok(Image {
        image_id,
        width,
        height,
        orientation: capture.orientation.unwrap_or_default(),
        created: capture.captured_at.unwrap_or(ingested_at),
        tags: Vec::new(),
    })
}

/// Parses the JPEG header only; no pixel data is decoded.
fn read_dimensions<R: Read + Seek>(stream: &mut R) -> Result<(u32, u32)> {
    ImageReader::with_format(BufReader::new(stream), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|err| EngineError::Decode(format!("cannot decode JPEG header: {err}")))
}

/// Never fails: missing or malformed EXIF is logged and reported as absent fields.
pub fn read_capture_metadata<R: Read + Seek>(stream: &mut R, image_id: &str) -> CaptureMetadata {
    let mut reader = BufReader::new(stream);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(err) => {
            warn!(image_id, "cannot extract EXIF metadata: {err}");
            return CaptureMetadata::default();
        }
    };

    CaptureMetadata {
        orientation: orientation(&exif, image_id),
        captured_at: captured_at(&exif, image_id),
    }
}

fn orientation(exif: &Exif, image_id: &str) -> Option<Orientation> {
    let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) else {
        debug!(image_id, "no orientation tag");
        return None;
    };
    match field.value.get_uint(0).and_then(|v| u16::try_from(v).ok()) {
        Some(code) => Some(Orientation(code)),
        None => {
            warn!(image_id, value = ?field.value, "cannot read image orientation");
            None
        }
    }
}

fn captured_at(exif: &Exif, image_id: &str) -> Option<DateTime<Utc>> {
    let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) else {
        debug!(image_id, "no original capture time");
        return None;
    };
    let Some(raw) = exif_string(&field.value) else {
        warn!(image_id, "capture time is not an ASCII value");
        return None;
    };
    match parse_exif_datetime(&raw) {
        Some(parsed) => Some(parsed),
        None => {
            warn!(image_id, raw = %raw, "cannot parse capture time");
            None
        }
    }
}

fn exif_string(value: &ExifValue) -> Option<String> {
    match value {
        ExifValue::Ascii(values) => values
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .map(|s| s.trim_matches('\u{0}').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// The zone-less EXIF value is taken as UTC.
pub fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
