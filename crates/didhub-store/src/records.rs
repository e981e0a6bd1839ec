//! Typed access to identifier records.
//!
//! Records of one registry kind live under `"{kind}/record/{did}"`, encoded
//! as canonical CBOR so that every backend stores identical bytes.

use bytes::Bytes;
use didhub_core::{decode_record, record_bytes, Did, IdentifierRecord};

use crate::error::{Result, StoreError};
use crate::traits::{Store, WriteBatch};

/// Record keyspace of one registry kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTable {
    prefix: String,
}

impl RecordTable {
    /// Keyspace for the given registry kind name.
    pub fn new(kind: &str) -> Self {
        Self {
            prefix: format!("{kind}/record/"),
        }
    }

    /// The key a record is stored under.
    pub fn key(&self, id: &Did) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Key prefix shared by every record of this kind.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Decode stored bytes.
    pub fn decode(&self, key: &str, bytes: &[u8]) -> Result<IdentifierRecord> {
        decode_record(bytes).map_err(|e| StoreError::InvalidData {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Encode a record for storage.
    pub fn encode(record: &IdentifierRecord) -> Bytes {
        Bytes::from(record_bytes(record))
    }

    /// Read a record.
    pub async fn get<S: Store + ?Sized>(
        &self,
        store: &S,
        id: &Did,
    ) -> Result<Option<IdentifierRecord>> {
        let key = self.key(id);
        match store.get(&key).await? {
            Some(bytes) => self.decode(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Stage a record write.
    pub fn stage_put(&self, batch: &mut WriteBatch, record: &IdentifierRecord) {
        batch.put(self.key(&record.id), Self::encode(record));
    }

    /// Stage a record removal.
    pub fn stage_delete(&self, batch: &mut WriteBatch, id: &Did) {
        batch.delete(self.key(id));
    }

    /// All records of this kind, in identifier order.
    pub async fn list<S: Store + ?Sized>(&self, store: &S) -> Result<Vec<IdentifierRecord>> {
        store
            .scan_prefix(&self.prefix)
            .await?
            .into_iter()
            .map(|(key, bytes)| self.decode(&key, &bytes))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use didhub_core::DocAnchor;

    fn record(id: &str) -> IdentifierRecord {
        IdentifierRecord::registered(
            Did::new(id),
            Did::new("did:bitxhub:relayroot:0xadmin"),
            DocAnchor::placeholder("."),
        )
    }

    #[tokio::test]
    async fn test_record_table_roundtrip() {
        let store = MemoryStore::new();
        let table = RecordTable::new("method");

        let mut batch = WriteBatch::new();
        table.stage_put(&mut batch, &record("did:bitxhub:b:."));
        table.stage_put(&mut batch, &record("did:bitxhub:a:."));
        store.write_batch(batch).await.unwrap();

        let got = table
            .get(&store, &Did::new("did:bitxhub:a:."))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, record("did:bitxhub:a:."));

        let ids: Vec<String> = table
            .list(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id.into_string())
            .collect();
        assert_eq!(ids, vec!["did:bitxhub:a:.", "did:bitxhub:b:."]);
    }

    #[tokio::test]
    async fn test_kinds_do_not_overlap() {
        let store = MemoryStore::new();
        let methods = RecordTable::new("method");
        let chains = RecordTable::new("chain");

        let mut batch = WriteBatch::new();
        methods.stage_put(&mut batch, &record("did:bitxhub:a:."));
        store.write_batch(batch).await.unwrap();

        assert!(chains.list(&store).await.unwrap().is_empty());
        assert!(chains
            .get(&store, &Did::new("did:bitxhub:a:."))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_reports_key() {
        let store = MemoryStore::new();
        let table = RecordTable::new("did");
        let id = Did::new("did:bitxhub:app:0x1");
        store
            .put(&table.key(&id), Bytes::from_static(&[0xff]))
            .await
            .unwrap();

        match table.get(&store, &id).await {
            Err(StoreError::InvalidData { key, .. }) => {
                assert_eq!(key, "did/record/did:bitxhub:app:0x1")
            }
            other => panic!("expected invalid data, got {other:?}"),
        }
    }
}
