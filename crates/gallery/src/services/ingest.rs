//! Upload path: extract identity and metadata, persist the blob, record the image, attach tags.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use blob_store::{BlobStore, StoreError};
use catalog::{Catalog, CatalogError};
use chrono::{DateTime, SubsecRound, Utc};
use core_types::{Image, TagLabel};
use engine::{EngineError, ImageEngine};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read upload: {0}")]
    Extract(#[source] EngineError),

    #[error("cannot rewind upload: {0}")]
    Rewind(#[source] io::Error),

    #[error("cannot store image {image_id}: {source}")]
    Store {
        image_id: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot record image {image_id}: {source}")]
    Catalog {
        image_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("cannot tag image {image_id} with {label}: {source}")]
    Tag {
        image_id: String,
        label: TagLabel,
        #[source]
        source: CatalogError,
    },
}

impl IngestError {
    /// HTTP status class for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::Extract(EngineError::Io(_)) | IngestError::Rewind(_) => 400,
            IngestError::Extract(_) => 422,
            IngestError::Store { .. } | IngestError::Catalog { .. } | IngestError::Tag { .. } => {
                500
            }
        }
    }
}

/// Result of one successful ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// The catalogued image with the tags attached by this upload.
    pub image: Image,
    /// The content was already catalogued; only tags were added.
    pub duplicate: bool,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<Image>,
    pub duplicates: Vec<Image>,
    /// Position of the failed item in the batch and why it failed.
    pub failed: Vec<(usize, IngestError)>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Ingestor {
    engine: ImageEngine,
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn Catalog>,
}

impl Ingestor {
    pub fn new(engine: ImageEngine, store: Arc<dyn BlobStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            engine,
            store,
            catalog,
        }
    }

    pub fn ingest<R: Read + Seek>(
        &self,
        stream: &mut R,
        labels: &[TagLabel],
    ) -> Result<IngestOutcome, IngestError> {
        self.ingest_at(stream, labels, Utc::now())
    }

    /// Ingests one upload with an explicit ingestion time, used as `created` when the file has
    /// no capture time and as the creation time of every tag. The time is truncated to whole
    /// seconds so the side-record, the catalog row and the outcome agree.
    ///
    /// Steps are not rolled back: a tag failure leaves the blob and the image row in place.
    pub fn ingest_at<R: Read + Seek>(
        &self,
        stream: &mut R,
        labels: &[TagLabel],
        ingested_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let ingested_at = ingested_at.trunc_subsecs(0);
        let extracted = self
            .engine
            .extract(stream, ingested_at)
            .map_err(IngestError::Extract)?;
        let image_id = extracted.image_id.clone();

        stream.seek(SeekFrom::Start(0)).map_err(IngestError::Rewind)?;
        self.store
            .put(&extracted, stream)
            .map_err(|source| IngestError::Store {
                image_id: image_id.clone(),
                source,
            })?;

        let catalog_err = |source: CatalogError| IngestError::Catalog {
            image_id: image_id.clone(),
            source,
        };
        let (mut image, duplicate) = match self.catalog.create_image(&extracted) {
            Ok(()) => {
                debug!(image_id = %image_id, "image recorded");
                (extracted, false)
            }
            Err(CatalogError::Conflict(_)) => {
                info!(image_id = %image_id, "image already ingested");
                let existing = self.catalog.image_by_id(&image_id).map_err(catalog_err)?;
                (existing, true)
            }
            Err(err) => {
                error!(image_id = %image_id, error = %err, "failed to record image");
                return Err(catalog_err(err));
            }
        };

        for label in labels {
            let Some(label) = label.normalized() else {
                warn!(image_id = %image_id, "skipping tag with empty name");
                continue;
            };
            let tag = label.bind(&image_id, ingested_at);
            if let Err(source) = self.catalog.create_tag(&tag) {
                error!(image_id = %image_id, tag = %label, error = %source, "failed to tag image");
                return Err(IngestError::Tag {
                    image_id,
                    label,
                    source,
                });
            }
            image.tags.push(tag);
        }

        Ok(IngestOutcome { image, duplicate })
    }

    /// Ingests every item independently; one bad upload does not stop the rest.
    pub fn ingest_batch<R, I>(&self, items: I) -> IngestReport
    where
        R: Read + Seek,
        I: IntoIterator<Item = (R, Vec<TagLabel>)>,
    {
        let mut report = IngestReport::default();
        for (index, (mut stream, labels)) in items.into_iter().enumerate() {
            match self.ingest(&mut stream, &labels) {
                Ok(IngestOutcome {
                    image,
                    duplicate: false,
                }) => report.ingested.push(image),
                Ok(IngestOutcome {
                    image,
                    duplicate: true,
                }) => report.duplicates.push(image),
                Err(err) => {
                    warn!(index, error = %err, "upload rejected");
                    report.failed.push((index, err));
                }
            }
        }
        report
    }
}
