//! SQLite schema versions.
//!
//! `MIGRATIONS[i]` moves the schema from version `i` to `i + 1`. Applied
//! versions are recorded in `schema_migrations`; pending ones run together in
//! one transaction when a store is opened.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

const MIGRATIONS: &[&str] = &[
    // v1: one ordered table holds state objects and "{kind}/record/{did}" rows.
    "CREATE TABLE kv (
        key   TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );",
    // v2: last write time per key.
    "ALTER TABLE kv ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;
     CREATE INDEX idx_kv_updated ON kv(updated_at);",
];

/// Schema version a freshly opened store ends up at.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied = schema_version(conn)?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {applied} is newer than supported version {CURRENT_VERSION}"
        )));
    }
    if applied == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        let version = index as u32 + 1;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
