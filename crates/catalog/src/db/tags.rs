use core_types::{Tag, TagGroup};
use rusqlite::params;

use crate::db::{parse_datetime, query_all, to_rfc3339, DbHandle, DbResult};

/// Upper bound on the tags returned for one image.
pub const MAX_TAGS_PER_IMAGE: u32 = 1000;

/// Tag rows carry no uniqueness constraint; re-applying a label adds another row.
/// Fails with `NotFound` when the image is not catalogued.
pub fn insert<H: DbHandle>(db: &H, tag: &Tag) -> DbResult<()> {
    db.execute(
        "INSERT INTO tags (tag_id, image_id, name, value, created) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tag.tag_id,
            tag.image_id,
            tag.name,
            tag.value,
            to_rfc3339(tag.created)
        ],
    )?;
    Ok(())
}

/// Tags of one image in the order they were applied.
pub fn for_image<H: DbHandle>(db: &H, image_id: &str) -> DbResult<Vec<Tag>> {
    query_all(
        db,
        "SELECT tag_id, image_id, name, value, created FROM tags
         WHERE image_id = ?1
         ORDER BY created ASC, id ASC
         LIMIT ?2",
        params![image_id, MAX_TAGS_PER_IMAGE],
        |row| {
            Ok(Tag {
                tag_id: row.get(0)?,
                image_id: row.get(1)?,
                name: row.get(2)?,
                value: row.get(3)?,
                created: parse_datetime(&row.get::<_, String>(4)?)?,
            })
        },
    )
}

/// Distinct `(name, value)` pairs with their row counts.
pub fn groups<H: DbHandle>(db: &H) -> DbResult<Vec<TagGroup>> {
    query_all(
        db,
        "SELECT name, value, COUNT(*) FROM tags
         GROUP BY name, value
         ORDER BY name ASC, value ASC",
        [],
        |row| {
            Ok(TagGroup {
                name: row.get(0)?,
                value: row.get(1)?,
                count: row.get::<_, i64>(2)?.max(0) as u64,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{images, CatalogDb};
    use crate::CatalogError;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::{Image, Orientation, TagLabel};

    fn seed(db: &CatalogDb, id: &str) {
        images::insert(
            db,
            &Image {
                image_id: id.into(),
                width: 10,
                height: 10,
                orientation: Orientation::NORMAL,
                created: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                tags: Vec::new(),
            },
        )
        .unwrap();
    }

    #[test]
    fn tags_come_back_in_application_order() {
        let db = CatalogDb::in_memory().unwrap();
        seed(&db, "a");
        let t0 = Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap();
        insert(&db, &TagLabel::new("second").bind("a", t0 + Duration::seconds(5))).unwrap();
        insert(&db, &TagLabel::with_value("first", "1").bind("a", t0)).unwrap();

        let tags = for_image(&db, "a").unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(tags[0].value.as_deref(), Some("1"));
        assert_eq!(tags[0].created, t0);
    }

    #[test]
    fn same_label_twice_keeps_both_rows_with_one_id() {
        let db = CatalogDb::in_memory().unwrap();
        seed(&db, "a");
        let tag = TagLabel::new("x").bind("a", Utc::now());
        insert(&db, &tag).unwrap();
        insert(&db, &tag).unwrap();
        let tags = for_image(&db, "a").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag_id, tags[1].tag_id);
    }

    #[test]
    fn tag_on_unknown_image_is_not_found() {
        let db = CatalogDb::in_memory().unwrap();
        let err = insert(&db, &TagLabel::new("x").bind("ghost", Utc::now())).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound), "{err:?}");
    }

    #[test]
    fn groups_count_rows_per_label() {
        let db = CatalogDb::in_memory().unwrap();
        seed(&db, "a");
        seed(&db, "b");
        let now = Utc::now();
        for (id, label) in [
            ("a", TagLabel::new("holiday")),
            ("b", TagLabel::new("holiday")),
            ("a", TagLabel::with_value("place", "sea")),
            ("b", TagLabel::with_value("place", "home")),
        ] {
            insert(&db, &label.bind(id, now)).unwrap();
        }

        let groups = groups(&db).unwrap();
        assert_eq!(
            groups,
            vec![
                TagGroup { name: "holiday".into(), value: None, count: 2 },
                TagGroup { name: "place".into(), value: Some("home".into()), count: 1 },
                TagGroup { name: "place".into(), value: Some("sea".into()), count: 1 },
            ]
        );
    }

    #[test]
    fn no_tags_is_empty_not_error() {
        let db = CatalogDb::in_memory().unwrap();
        seed(&db, "a");
        assert!(for_image(&db, "a").unwrap().is_empty());
        assert!(groups(&db).unwrap().is_empty());
    }
}
