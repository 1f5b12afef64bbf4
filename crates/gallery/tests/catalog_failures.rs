use std::io::Cursor;
use std::sync::Arc;

use blob_store::{BlobStore, FileStore, ThumbnailCache};
use catalog::{Catalog, CatalogError, CatalogService};
use core_types::{Image, ImagesOpts, Tag, TagGroup, TagLabel};
use engine::testing::jpeg_with_exif;
use engine::ImageEngine;
use gallery::{IngestError, Ingestor, RetrieveError, RetrieveRequest, Retriever};
use rusqlite::ffi;

/// Delegates to a real catalog, failing the operations it is told to fail.
struct FailingCatalog {
    inner: CatalogService,
    fail_create_image: bool,
    fail_lookup: bool,
    fail_tag_named: Option<&'static str>,
}

impl FailingCatalog {
    fn new() -> Self {
        Self {
            inner: CatalogService::in_memory().unwrap(),
            fail_create_image: false,
            fail_lookup: false,
            fail_tag_named: None,
        }
    }
}

fn disk_error() -> CatalogError {
    CatalogError::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_IOERR),
        Some("disk I/O error".into()),
    ))
}

impl Catalog for FailingCatalog {
    fn create_image(&self, image: &Image) -> catalog::Result<()> {
        if self.fail_create_image {
            return Err(disk_error());
        }
        self.inner.create_image(image)
    }

    fn create_tag(&self, tag: &Tag) -> catalog::Result<()> {
        if self.fail_tag_named == Some(tag.name.as_str()) {
            return Err(disk_error());
        }
        self.inner.create_tag(tag)
    }

    fn image_by_id(&self, image_id: &str) -> catalog::Result<Image> {
        if self.fail_lookup {
            return Err(disk_error());
        }
        self.inner.image_by_id(image_id)
    }

    fn image_tags(&self, image_id: &str) -> catalog::Result<Vec<Tag>> {
        self.inner.image_tags(image_id)
    }

    fn list_images(&self, opts: &ImagesOpts) -> catalog::Result<Vec<Image>> {
        self.inner.list_images(opts)
    }

    fn tag_groups(&self) -> catalog::Result<Vec<TagGroup>> {
        self.inner.tag_groups()
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<FileStore>,
    catalog: Arc<FailingCatalog>,
    ingestor: Ingestor,
    retriever: Retriever,
}

fn harness(catalog: FailingCatalog) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("photos")));
    let catalog = Arc::new(catalog);
    let thumbnails = Arc::new(ThumbnailCache::new(
        dir.path().join("thumbnails"),
        store.clone(),
        ImageEngine::new(),
    ));
    let ingestor = Ingestor::new(ImageEngine::new(), store.clone(), catalog.clone());
    let retriever = Retriever::new(ImageEngine::new(), store.clone(), thumbnails, catalog.clone());
    Harness {
        _dir: dir,
        store,
        catalog,
        ingestor,
        retriever,
    }
}

fn photo() -> Vec<u8> {
    jpeg_with_exif(16, 12, Some(1), Some("2016:04:05 06:07:08"))
}

#[test]
fn catalog_insert_failure_aborts_the_item() {
    let h = harness(FailingCatalog {
        fail_create_image: true,
        ..FailingCatalog::new()
    });
    let err = h
        .ingestor
        .ingest(&mut Cursor::new(photo()), &[TagLabel::new("x")])
        .unwrap_err();

    assert!(matches!(err, IngestError::Catalog { .. }), "{err:?}");
    assert_eq!(err.status_code(), 500);
    assert!(h.catalog.list_images(&ImagesOpts::default()).unwrap().is_empty());
    assert!(h.catalog.tag_groups().unwrap().is_empty());
}

#[test]
fn tag_failure_keeps_blob_record_and_earlier_tags() {
    let h = harness(FailingCatalog {
        fail_tag_named: Some("broken"),
        ..FailingCatalog::new()
    });
    let bytes = photo();
    let err = h
        .ingestor
        .ingest(
            &mut Cursor::new(&bytes),
            &[
                TagLabel::new("kept"),
                TagLabel::new("broken"),
                TagLabel::new("never"),
            ],
        )
        .unwrap_err();

    let IngestError::Tag { image_id, label, .. } = &err else {
        panic!("expected a tag failure, got {err:?}");
    };
    assert_eq!(label.name, "broken");
    assert_eq!(err.status_code(), 500);

    let row = h.catalog.image_by_id(image_id).unwrap();
    assert_eq!(row.year(), 2016);
    let stored = h.store.read_bytes(2016, image_id).unwrap();
    assert_eq!(stored, bytes);
    assert_eq!(h.store.read_meta(2016, image_id).unwrap().image_id, *image_id);

    let names: Vec<_> = h
        .catalog
        .image_tags(image_id)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["kept"]);
}

#[test]
fn catalog_lookup_failure_is_a_server_error() {
    let h = harness(FailingCatalog::new());
    let id = h
        .ingestor
        .ingest(&mut Cursor::new(photo()), &[])
        .unwrap()
        .image
        .image_id;

    let failing = Retriever::new(
        ImageEngine::new(),
        h.store.clone(),
        Arc::new(ThumbnailCache::new(
            h.store.root().join("unused"),
            h.store.clone(),
            ImageEngine::new(),
        )),
        Arc::new(FailingCatalog {
            fail_lookup: true,
            ..FailingCatalog::new()
        }),
    );
    let err = failing
        .retrieve(&RetrieveRequest::original(&id))
        .unwrap_err();
    assert!(matches!(err, RetrieveError::Catalog { .. }), "{err:?}");
    assert_eq!(err.status_code(), 500);

    assert!(h.retriever.retrieve(&RetrieveRequest::original(&id)).is_ok());
}
