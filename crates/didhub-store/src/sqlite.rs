//! SQLite implementation of the Store trait.
//!
//! This is the persistent storage backend for DIDHub registries. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{prefix_end, BatchOp, Store, WriteBatch};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    prefix: Option<&str>,
) -> Result<Vec<(String, Bytes)>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        if let Some(prefix) = prefix {
            if !key.starts_with(prefix) {
                break;
            }
        }
        let value: Vec<u8> = row.get(1)?;
        out.push((key, Bytes::from(value)));
    }
    Ok(out)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value.as_ref(), now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let removed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        let prefix = prefix.to_string();
        self.blocking(move |conn| match prefix_end(&prefix) {
            Some(end) => collect_rows(
                conn,
                "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
                &[&prefix, &end],
                None,
            ),
            None => collect_rows(
                conn,
                "SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key",
                &[&prefix],
                Some(&prefix),
            ),
        })
        .await
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Bytes)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let (start, end) = (start.to_string(), end.to_string());
        self.blocking(move |conn| {
            collect_rows(
                conn,
                "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
                &[&start, &end],
                None,
            )
        })
        .await
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put { key, value } => {
                        tx.execute(
                            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                            updated_at = excluded.updated_at",
                            params![key, value.as_ref(), now],
                        )?;
                    }
                    BatchOp::Delete { key } => {
                        tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = SqliteStore::open_memory().unwrap();

        store
            .put("DIDRegistry", Bytes::from_static(b"state"))
            .await
            .unwrap();
        assert!(store.has("DIDRegistry").await.unwrap());
        assert_eq!(
            store.get("DIDRegistry").await.unwrap(),
            Some(Bytes::from_static(b"state"))
        );

        store
            .put("DIDRegistry", Bytes::from_static(b"state2"))
            .await
            .unwrap();
        assert_eq!(
            store.get("DIDRegistry").await.unwrap(),
            Some(Bytes::from_static(b"state2"))
        );

        assert!(store.delete("DIDRegistry").await.unwrap());
        assert!(!store.has("DIDRegistry").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let store = SqliteStore::open_memory().unwrap();
        for key in [
            "did/record/did:bitxhub:app:0x2",
            "did/record/did:bitxhub:app:0x1",
            "did/recordz",
            "method/record/did:bitxhub:app:.",
        ] {
            store.put(key, Bytes::from_static(b"v")).await.unwrap();
        }

        let keys: Vec<String> = store
            .scan_prefix("did/record/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                "did/record/did:bitxhub:app:0x1".to_string(),
                "did/record/did:bitxhub:app:0x2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_batch_atomic_order() {
        let store = SqliteStore::open_memory().unwrap();
        store.put("old", Bytes::from_static(b"x")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put("a", Bytes::from_static(b"1"));
        batch.delete("old");
        batch.put("a", Bytes::from_static(b"2"));
        store.write_batch(batch).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"2")));
        assert!(!store.has("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put("MethodRegistry", Bytes::from_static(b"persisted"))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("MethodRegistry").await.unwrap(),
            Some(Bytes::from_static(b"persisted"))
        );
    }
}
