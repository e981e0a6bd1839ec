//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{prefix_end, BatchOp, Store, WriteBatch};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Bytes>>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Bytes>>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.write()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        let inner = self.read()?;
        let upper = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        Ok(inner
            .range::<String, _>((Bound::Included(prefix.to_string()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Bytes)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let inner = self.read()?;
        Ok(inner
            .range::<str, _>((Bound::Included(start), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.write()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    inner.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    inner.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        store
            .put("MethodRegistry", Bytes::from_static(b"state"))
            .await
            .unwrap();
        assert!(store.has("MethodRegistry").await.unwrap());
        assert_eq!(
            store.get("MethodRegistry").await.unwrap(),
            Some(Bytes::from_static(b"state"))
        );

        assert!(store.delete("MethodRegistry").await.unwrap());
        assert!(!store.delete("MethodRegistry").await.unwrap());
        assert_eq!(store.get("MethodRegistry").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for key in [
            "method/record/did:bitxhub:b:.",
            "method/record/did:bitxhub:a:.",
            "method/recorx",
            "did/record/did:bitxhub:a:0x1",
        ] {
            store.put(key, Bytes::from_static(b"v")).await.unwrap();
        }

        let keys: Vec<String> = store
            .scan_prefix("method/record/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                "method/record/did:bitxhub:a:.".to_string(),
                "method/record/did:bitxhub:b:.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_range_half_open() {
        let store = MemoryStore::new();
        for key in ["a", "b", "c", "d"] {
            store.put(key, Bytes::from_static(b"v")).await.unwrap();
        }
        let keys: Vec<String> = store
            .range("b", "d")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
        assert!(store.range("d", "b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_batch() {
        let store = MemoryStore::new();
        store.put("gone", Bytes::from_static(b"x")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put("a", Bytes::from_static(b"1"));
        batch.put("a", Bytes::from_static(b"2"));
        batch.delete("gone");
        store.write_batch(batch).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"2")));
        assert!(!store.has("gone").await.unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        proptest! {
            #[test]
            fn test_scan_prefix_matches_model(
                entries in proptest::collection::btree_map("[ab]/[a-z]{1,6}", any::<u8>(), 0..32),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let scanned = rt.block_on(async {
                    let store = MemoryStore::new();
                    let mut batch = WriteBatch::new();
                    for (key, value) in &entries {
                        batch.put(key.clone(), vec![*value]);
                    }
                    store.write_batch(batch).await.unwrap();
                    store.scan_prefix("a/").await.unwrap()
                });

                let model: BTreeMap<_, _> = entries
                    .into_iter()
                    .filter(|(k, _)| k.starts_with("a/"))
                    .collect();
                prop_assert_eq!(scanned.len(), model.len());
                for ((key, bytes), (mk, mv)) in scanned.iter().zip(model.iter()) {
                    prop_assert_eq!(key, mk);
                    prop_assert_eq!(&bytes[..], &[*mv][..]);
                }
            }
        }
    }
}
