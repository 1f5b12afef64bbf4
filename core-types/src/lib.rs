pub mod identity;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type of the single raster format the gallery stores.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// File extension used for originals and thumbnails.
pub const IMAGE_EXTENSION: &str = "jpg";

/// A stored photograph. `image_id` is the content hash of the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Image {
    /// Four-digit year used to shard the on-disk layout.
    pub fn year(&self) -> i32 {
        self.created.year()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_id: String,
    pub image_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub created: DateTime<Utc>,
}

/// A label supplied by the uploader, before it is bound to an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLabel {
    pub name: String,
    pub value: Option<String>,
}

impl TagLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Parses `name` or `name=value`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once('=') {
            Some((name, value)) => Self::with_value(name, value).normalized(),
            None => Self::new(raw).normalized(),
        }
    }

    /// Binds the label to an image as a catalog tag row.
    pub fn bind(&self, image_id: &str, created: DateTime<Utc>) -> Tag {
        Tag {
            tag_id: identity::tag_id(image_id, &self.name, self.value.as_deref()),
            image_id: image_id.to_string(),
            name: self.name.clone(),
            value: self.value.clone(),
            created,
        }
    }

    /// Trims both parts. Returns `None` when the name is blank; a blank value becomes absent.
    pub fn normalized(&self) -> Option<Self> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let value = self
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Some(Self {
            name: name.to_string(),
            value,
        })
    }
}

impl fmt::Display for TagLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// One conjunct of a listing filter. A `None` value matches any value of the named tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: String,
    pub value: Option<String>,
}

impl From<TagLabel> for TagFilter {
    fn from(label: TagLabel) -> Self {
        Self {
            name: label.name,
            value: label.value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesOpts {
    pub limit: u32,
    pub offset: u32,
    pub tags: Vec<TagFilter>,
}

/// Distinct tag label and how many tag rows carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub name: String,
    pub value: Option<String>,
    pub count: u64,
}

/// EXIF orientation code. Only `1`, `3`, `6` and `8` have a rendering transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orientation(pub u16);

impl Orientation {
    pub const NORMAL: Orientation = Orientation(1);
    pub const ROTATE_180: Orientation = Orientation(3);
    /// Stored rotated; display needs a 90° clockwise turn.
    pub const ROTATE_90_CW: Orientation = Orientation(6);
    /// Stored rotated; display needs a 90° counter-clockwise turn.
    pub const ROTATE_90_CCW: Orientation = Orientation(8);

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn is_recognized(self) -> bool {
        matches!(self.0, 1 | 3 | 6 | 8)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
