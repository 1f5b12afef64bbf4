//! Row-level bindings for the catalog SQLite schema.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row};

use crate::CatalogError;

pub mod db;
pub mod images;
pub mod query;
pub mod tags;

pub use db::CatalogDb;
pub use query::Query;

pub type DbResult<T> = std::result::Result<T, CatalogError>;

/// Common trait allowing modules to operate over a raw `Connection` or a [`CatalogDb`].
pub trait DbHandle {
    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize>;
    fn prepare<'a>(&'a self, sql: &str) -> rusqlite::Result<rusqlite::Statement<'a>>;
}

impl DbHandle for Connection {
    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize> {
        Connection::execute(self, sql, params)
    }

    fn prepare<'a>(&'a self, sql: &str) -> rusqlite::Result<rusqlite::Statement<'a>> {
        Connection::prepare(self, sql)
    }
}

/// Map a single row result to a typed value; no rows is [`CatalogError::NotFound`].
pub fn query_one<T, H, P, F>(db: &H, sql: &str, params: P, map: F) -> DbResult<T>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnOnce(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let row = rows.next()?.ok_or(CatalogError::NotFound)?;
    map(row)
}

/// Collect all rows from a query into a vector.
pub fn query_all<T, H, P, F>(db: &H, sql: &str, params: P, mut map: F) -> DbResult<Vec<T>>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnMut(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map(row)?);
    }
    Ok(out)
}

/// Fixed-width UTC form, so text order matches time order.
pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(raw: &str) -> DbResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let early = to_rfc3339(Utc.with_ymd_and_hms(2009, 12, 31, 23, 0, 0).unwrap());
        let late = to_rfc3339(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap());
        assert!(early < late);
        assert_eq!(late, "2010-01-01T00:00:00.000Z");
        assert_eq!(
            parse_datetime(&late).unwrap(),
            Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
