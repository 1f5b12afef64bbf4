//! SQLite schema DDL and catalog initialization.

use rusqlite::Connection;

use crate::CatalogError;

/// SQLite schema version supported by this build.
pub const TARGET_SCHEMA_VERSION: i64 = 1;

pub const CATALOG_SCHEMA_SQL: &str = include_str!("../schema/catalog_schema.sql");

/// Applies the catalog schema (or upgrades an existing catalog) on the provided connection.
///
/// Enables WAL journaling and foreign keys, runs pending migrations and keeps
/// `PRAGMA user_version` aligned with [`TARGET_SCHEMA_VERSION`]. A catalog written by a
/// newer build is refused rather than modified.
pub fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
    // In-memory databases answer "memory"; either answer is fine.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version > TARGET_SCHEMA_VERSION {
        return Err(CatalogError::UnsupportedVersion(user_version));
    }
    if user_version < TARGET_SCHEMA_VERSION {
        apply_migrations(conn, user_version)?;
    }

    conn.pragma_update(None, "user_version", TARGET_SCHEMA_VERSION)?;
    Ok(())
}

fn apply_migrations(conn: &Connection, from_version: i64) -> Result<(), CatalogError> {
    match from_version {
        0 => Ok(conn.execute_batch(CATALOG_SCHEMA_SQL)?),
        other => Err(CatalogError::UnsupportedVersion(other)),
    }
}
