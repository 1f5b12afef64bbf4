//! Read path: catalog lookup, conditional-GET decision, then original or rendition bytes.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use blob_store::{BlobStore, StoreError, ThumbnailCache};
use catalog::{Catalog, CatalogError};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use core_types::{Image, IMAGE_CONTENT_TYPE};
use engine::{EngineError, ImageEngine};
use thiserror::Error;
use tracing::{debug, error};

pub const HEADER_IMAGE_ID: &str = "X-Image-ID";
pub const HEADER_IMAGE_WIDTH: &str = "X-Image-Width";
pub const HEADER_IMAGE_HEIGHT: &str = "X-Image-Height";
pub const HEADER_IMAGE_CREATED: &str = "X-Image-Created";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_LAST_MODIFIED: &str = "Last-Modified";

/// Largest edge accepted for an ad-hoc resize.
pub const MAX_RESIZE_EDGE: u32 = 4096;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("image {0} not found")]
    NotFound(String),

    #[error("invalid resize target {0:?}")]
    InvalidResize(String),

    #[error("catalog lookup for {image_id} failed: {source}")]
    Catalog {
        image_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("cannot read image {image_id}: {source}")]
    Store {
        image_id: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot render image {image_id}: {source}")]
    Render {
        image_id: String,
        #[source]
        source: EngineError,
    },
}

impl RetrieveError {
    pub fn status_code(&self) -> u16 {
        match self {
            RetrieveError::NotFound(_) => 404,
            RetrieveError::InvalidResize(_) => 400,
            RetrieveError::Catalog { .. }
            | RetrieveError::Store { .. }
            | RetrieveError::Render { .. } => 500,
        }
    }
}

/// Which bytes to serve for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rendition {
    #[default]
    Original,
    /// The cached square thumbnail.
    Thumbnail,
    /// Orientation-corrected center fill of the given size. Served from the thumbnail cache
    /// when it matches the cached size, rendered on the fly otherwise.
    Resize { width: u32, height: u32 },
}

impl Rendition {
    /// Parses the `WxH` form of a resize request.
    pub fn parse_resize(raw: &str) -> Result<Self, RetrieveError> {
        let invalid = || RetrieveError::InvalidResize(raw.to_string());
        let (width, height) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 || width > MAX_RESIZE_EDGE || height > MAX_RESIZE_EDGE {
            return Err(invalid());
        }
        Ok(Rendition::Resize { width, height })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    pub image_id: String,
    pub rendition: Rendition,
    pub if_modified_since: Option<DateTime<Utc>>,
}

impl RetrieveRequest {
    pub fn original(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            rendition: Rendition::Original,
            if_modified_since: None,
        }
    }

    pub fn with_rendition(mut self, rendition: Rendition) -> Self {
        self.rendition = rendition;
        self
    }

    pub fn if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }
}

pub struct Content {
    pub body: Box<dyn Read + Send>,
    pub content_type: &'static str,
    /// Response headers in emission order, `Content-Type` included.
    pub headers: Vec<(&'static str, String)>,
}

impl Content {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Outcome of a retrieval. `NotModified` carries no body and no body-describing headers.
#[derive(Debug)]
pub enum Retrieved {
    NotModified,
    Content(Content),
}

#[derive(Clone)]
pub struct Retriever {
    engine: ImageEngine,
    store: Arc<dyn BlobStore>,
    thumbnails: Arc<ThumbnailCache>,
    catalog: Arc<dyn Catalog>,
}

impl Retriever {
    pub fn new(
        engine: ImageEngine,
        store: Arc<dyn BlobStore>,
        thumbnails: Arc<ThumbnailCache>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            engine,
            store,
            thumbnails,
            catalog,
        }
    }

    pub fn retrieve(&self, request: &RetrieveRequest) -> Result<Retrieved, RetrieveError> {
        let image_id = request.image_id.as_str();
        let image = match self.catalog.image_by_id(image_id) {
            Ok(image) => image,
            Err(CatalogError::NotFound) => {
                debug!(image_id, "image not found");
                return Err(RetrieveError::NotFound(image_id.to_string()));
            }
            Err(source) => {
                error!(image_id, error = %source, "catalog lookup failed");
                return Err(RetrieveError::Catalog {
                    image_id: image_id.to_string(),
                    source,
                });
            }
        };

        if let Some(since) = request.if_modified_since {
            if !modified_since(image.created, since) {
                debug!(image_id, "not modified");
                return Ok(Retrieved::NotModified);
            }
        }

        let body = self.body(&image, request.rendition)?;
        Ok(Retrieved::Content(Content {
            body,
            content_type: IMAGE_CONTENT_TYPE,
            headers: response_headers(&image),
        }))
    }

    fn body(&self, image: &Image, rendition: Rendition) -> Result<Box<dyn Read + Send>, RetrieveError> {
        let year = image.year();
        let store_err = |source: StoreError| {
            error!(image_id = %image.image_id, error = %source, "cannot read image");
            RetrieveError::Store {
                image_id: image.image_id.clone(),
                source,
            }
        };
        let size = self.thumbnails.size();
        match rendition {
            Rendition::Original => self.store.read(year, &image.image_id).map_err(store_err),
            Rendition::Thumbnail => self.thumbnail(image),
            Rendition::Resize { width, height } if width == size && height == size => {
                self.thumbnail(image)
            }
            Rendition::Resize { width, height } => {
                let original = self
                    .store
                    .read_bytes(year, &image.image_id)
                    .map_err(store_err)?;
                let bytes = self
                    .engine
                    .render_fill(&original, image.orientation, width, height)
                    .map_err(|source| {
                        error!(image_id = %image.image_id, error = %source, "resize failed");
                        RetrieveError::Render {
                            image_id: image.image_id.clone(),
                            source,
                        }
                    })?;
                Ok(Box::new(Cursor::new(bytes)))
            }
        }
    }

    fn thumbnail(&self, image: &Image) -> Result<Box<dyn Read + Send>, RetrieveError> {
        self.thumbnails
            .read_thumbnail(image.year(), image.orientation, &image.image_id)
            .map_err(|err| match err {
                StoreError::Render(source) => RetrieveError::Render {
                    image_id: image.image_id.clone(),
                    source,
                },
                source => RetrieveError::Store {
                    image_id: image.image_id.clone(),
                    source,
                },
            })
    }
}

/// `false` when the caller's copy, stamped `since`, is no earlier than one second before
/// `created`. HTTP dates have whole-second precision.
pub fn modified_since(created: DateTime<Utc>, since: DateTime<Utc>) -> bool {
    since < created - Duration::seconds(1)
}

fn response_headers(image: &Image) -> Vec<(&'static str, String)> {
    vec![
        (HEADER_IMAGE_ID, image.image_id.clone()),
        (HEADER_IMAGE_WIDTH, image.width.to_string()),
        (HEADER_IMAGE_HEIGHT, image.height.to_string()),
        (
            HEADER_IMAGE_CREATED,
            image.created.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (HEADER_CONTENT_TYPE, IMAGE_CONTENT_TYPE.to_string()),
        (HEADER_LAST_MODIFIED, format_http_date(image.created)),
    ]
}

/// `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(ts: DateTime<Utc>) -> String {
    ts.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an `If-Modified-Since` value. Unparsable input yields `None`, which disables the
/// conditional check.
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, HTTP_DATE_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resize_parsing() {
        assert_eq!(
            Rendition::parse_resize("100x100").unwrap(),
            Rendition::Resize { width: 100, height: 100 }
        );
        assert_eq!(
            Rendition::parse_resize(" 640X480 ").unwrap(),
            Rendition::Resize { width: 640, height: 480 }
        );
        for raw in ["", "100", "0x10", "10x", "axb", "-1x5", "5000x10"] {
            let err = Rendition::parse_resize(raw).unwrap_err();
            assert_eq!(err.status_code(), 400, "{raw}");
        }
    }

    #[test]
    fn http_dates_round_trip() {
        let ts = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_http_date(ts), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(ts));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn conditional_window_is_one_second() {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        assert!(!modified_since(created, created));
        assert!(!modified_since(created, created - Duration::seconds(1)));
        assert!(!modified_since(created, created + Duration::days(1)));
        assert!(modified_since(created, created - Duration::seconds(2)));
        assert!(modified_since(created, created - Duration::milliseconds(1001)));
    }
}
