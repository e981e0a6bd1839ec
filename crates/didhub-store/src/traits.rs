//! Store trait: the abstract interface for registry persistence.
//!
//! Registries see storage as an ordered key-value map. Keys are UTF-8 strings
//! (object names and `"{kind}/record/{did}"` record keys); values are opaque
//! bytes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, StoreError};

/// A single staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: Bytes },
    Delete { key: String },
}

impl BatchOp {
    /// The key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// An ordered set of writes applied atomically by [`Store::write_batch`].
///
/// Later operations on the same key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Stage a delete.
    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// The staged state of a key, if this batch touches it.
    ///
    /// `Some(None)` means the key is staged for deletion.
    pub fn staged(&self, key: &str) -> Option<Option<&Bytes>> {
        self.ops.iter().rev().find(|op| op.key() == key).map(|op| match op {
            BatchOp::Put { value, .. } => Some(value),
            BatchOp::Delete { .. } => None,
        })
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged operations, in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume into the staged operations.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// The Store trait: async interface for ordered key-value persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Check whether a key is present.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove a key. Returns whether it was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>>;

    /// All entries with `start <= key < end`, in key order.
    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Bytes)>>;

    /// Apply a batch of writes atomically.
    async fn write_batch(&self, batch: WriteBatch) -> Result<()>;
}

/// Typed object access on top of a [`Store`].
///
/// Objects are serialized as CBOR.
#[async_trait]
pub trait StoreExt: Store {
    /// Read and decode an object.
    async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => decode_object(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and write an object.
    async fn set_object<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = encode_object(value)?;
        self.put(key, bytes).await
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Encode an object as CBOR.
pub fn encode_object<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR object read from `key`.
pub fn decode_object<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::InvalidData {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Smallest key greater than every key starting with `prefix`, if any.
pub(crate) fn prefix_end(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = char::from_u32(last as u32 + 1) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
