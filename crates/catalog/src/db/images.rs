use core_types::{Image, ImagesOpts, Orientation, TagFilter};
use rusqlite::{params, params_from_iter};

use crate::db::{parse_datetime, query_all, query_one, to_rfc3339, DbHandle, DbResult, Query};

/// Page size used when the caller passes `limit = 0`.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

const SELECT_IMAGES: &str =
    "SELECT i.image_id, i.width, i.height, i.orientation, i.created FROM images i";

/// Fails with `Conflict` when the identity is already catalogued.
pub fn insert<H: DbHandle>(db: &H, image: &Image) -> DbResult<()> {
    db.execute(
        "INSERT INTO images (image_id, width, height, orientation, created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            image.image_id,
            image.width,
            image.height,
            image.orientation.code(),
            to_rfc3339(image.created)
        ],
    )?;
    Ok(())
}

pub fn load<H: DbHandle>(db: &H, image_id: &str) -> DbResult<Image> {
    query_one(
        db,
        &format!("{SELECT_IMAGES} WHERE i.image_id = ?1 LIMIT 1"),
        params![image_id],
        from_row,
    )
}

/// Newest first. Each tag filter adds an `EXISTS` conjunct, so an image matches only when
/// every filter is satisfied by at least one of its tags.
pub fn list<H: DbHandle>(db: &H, opts: &ImagesOpts) -> DbResult<Vec<Image>> {
    let (sql, args) = list_query(opts).build();
    query_all(db, &sql, params_from_iter(args), from_row)
}

pub(crate) fn list_query(opts: &ImagesOpts) -> Query {
    let mut q = Query::new(SELECT_IMAGES);
    for TagFilter { name, value } in &opts.tags {
        match value {
            Some(value) => q.filter(
                "EXISTS (SELECT 1 FROM tags t
                         WHERE t.image_id = i.image_id AND t.name = ? AND t.value = ?)",
                [name.clone(), value.clone()],
            ),
            None => q.filter(
                "EXISTS (SELECT 1 FROM tags t WHERE t.image_id = i.image_id AND t.name = ?)",
                [name.clone()],
            ),
        };
    }
    let limit = if opts.limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        opts.limit
    };
    q.order_by("i.created DESC, i.image_id ASC")
        .limit(i64::from(limit), i64::from(opts.offset));
    q
}

pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Image> {
    Ok(Image {
        image_id: row.get(0)?,
        width: row.get(1)?,
        height: row.get(2)?,
        orientation: Orientation(row.get(3)?),
        created: parse_datetime(&row.get::<_, String>(4)?)?,
        tags: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tags;
    use crate::db::CatalogDb;
    use crate::CatalogError;
    use chrono::{TimeZone, Utc};
    use core_types::TagLabel;

    fn image(id: &str, year: i32) -> Image {
        Image {
            image_id: id.into(),
            width: 640,
            height: 480,
            orientation: Orientation::NORMAL,
            created: Utc.with_ymd_and_hms(year, 5, 1, 12, 0, 0).unwrap(),
            tags: Vec::new(),
        }
    }

    fn tag(db: &CatalogDb, image_id: &str, label: TagLabel) {
        tags::insert(db, &label.bind(image_id, Utc::now())).unwrap();
    }

    fn ids(images: &[Image]) -> Vec<&str> {
        images.iter().map(|i| i.image_id.as_str()).collect()
    }

    #[test]
    fn insert_and_load_round_trip() {
        let db = CatalogDb::in_memory().unwrap();
        let mut img = image("a", 2015);
        img.orientation = Orientation::ROTATE_90_CCW;
        insert(&db, &img).unwrap();
        assert_eq!(load(&db, "a").unwrap(), img);
    }

    #[test]
    fn duplicate_identity_is_a_conflict() {
        let db = CatalogDb::in_memory().unwrap();
        insert(&db, &image("a", 2015)).unwrap();
        let err = insert(&db, &image("a", 2016)).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");
        assert_eq!(load(&db, "a").unwrap().created.format("%Y").to_string(), "2015");
    }

    #[test]
    fn missing_identity_is_not_found() {
        let db = CatalogDb::in_memory().unwrap();
        assert!(matches!(load(&db, "nope"), Err(CatalogError::NotFound)));
    }

    #[test]
    fn tag_filters_are_conjunctive() {
        let db = CatalogDb::in_memory().unwrap();
        insert(&db, &image("a", 2014)).unwrap();
        insert(&db, &image("b", 2015)).unwrap();
        insert(&db, &image("c", 2016)).unwrap();
        tag(&db, "a", TagLabel::new("x"));
        tag(&db, "b", TagLabel::new("x"));
        tag(&db, "b", TagLabel::new("y"));

        let both = list(
            &db,
            &ImagesOpts {
                tags: vec![TagLabel::new("x").into(), TagLabel::new("y").into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ids(&both), ["b"]);

        let only_x = list(
            &db,
            &ImagesOpts {
                tags: vec![TagLabel::new("x").into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ids(&only_x), ["b", "a"]);
    }

    #[test]
    fn value_filter_matches_exact_value() {
        let db = CatalogDb::in_memory().unwrap();
        insert(&db, &image("a", 2014)).unwrap();
        insert(&db, &image("b", 2015)).unwrap();
        tag(&db, "a", TagLabel::with_value("place", "home"));
        tag(&db, "b", TagLabel::with_value("place", "sea"));

        let home = list(
            &db,
            &ImagesOpts {
                tags: vec![TagLabel::with_value("place", "home").into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ids(&home), ["a"]);

        let any_place = list(
            &db,
            &ImagesOpts {
                tags: vec![TagLabel::new("place").into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ids(&any_place), ["b", "a"]);
    }

    #[test]
    fn repeated_tag_does_not_duplicate_listing_rows() {
        let db = CatalogDb::in_memory().unwrap();
        insert(&db, &image("a", 2014)).unwrap();
        tag(&db, "a", TagLabel::new("x"));
        tag(&db, "a", TagLabel::new("x"));
        let found = list(
            &db,
            &ImagesOpts {
                tags: vec![TagLabel::new("x").into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ids(&found), ["a"]);
    }

    #[test]
    fn pagination_walks_newest_first() {
        let db = CatalogDb::in_memory().unwrap();
        for (id, year) in [("a", 2010), ("b", 2011), ("c", 2012), ("d", 2013)] {
            insert(&db, &image(id, year)).unwrap();
        }
        let page = |offset| {
            list(
                &db,
                &ImagesOpts {
                    limit: 2,
                    offset,
                    tags: Vec::new(),
                },
            )
            .unwrap()
        };
        assert_eq!(ids(&page(0)), ["d", "c"]);
        assert_eq!(ids(&page(2)), ["b", "a"]);
        assert!(page(4).is_empty());
    }
}
