//! Convergence verification for mirrored registries.
//!
//! After synchronizing, a parent and a child can check that they hold the
//! same anchored records by comparing deterministic digests instead of
//! exchanging the records themselves.

use didhub_core::{Blake3Hash, IdentifierRecord, Status};
use didhub_store::{RecordTable, Store};

use crate::error::Result;

const DIGEST_DOMAIN: &[u8] = b"didhub-registry-v0:";

/// Digest a set of records.
///
/// Records are sorted by identifier, then hashed as
/// `Blake3(domain || count || (len || canonical record)*)`.
pub fn records_digest<'a, I>(records: I) -> Blake3Hash
where
    I: IntoIterator<Item = &'a IdentifierRecord>,
{
    let mut sorted: Vec<&IdentifierRecord> = records.into_iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = blake3::Hasher::new();
    hasher.update(DIGEST_DOMAIN);
    hasher.update(&(sorted.len() as u64).to_be_bytes());
    for record in sorted {
        let bytes = didhub_core::record_bytes(record);
        hasher.update(&(bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    Blake3Hash(*hasher.finalize().as_bytes())
}

/// Digest only the records that synchronization mirrors.
pub fn anchored_digest<'a, I>(records: I) -> Blake3Hash
where
    I: IntoIterator<Item = &'a IdentifierRecord>,
{
    records_digest(
        records
            .into_iter()
            .filter(|r| matches!(r.status, Status::Registered | Status::Frozen)),
    )
}

/// Digest of the anchored records in one table of a store.
pub async fn compute_registry_digest<S: Store + ?Sized>(
    store: &S,
    table: &RecordTable,
) -> Result<Blake3Hash> {
    let records = table.list(store).await?;
    Ok(anchored_digest(&records))
}

/// Compare the local anchored state against a peer's digest.
pub async fn verify_convergence<S: Store + ?Sized>(
    store: &S,
    table: &RecordTable,
    remote: &Blake3Hash,
) -> Result<ConvergenceResult> {
    let local = compute_registry_digest(store, table).await?;
    if &local == remote {
        Ok(ConvergenceResult::Converged)
    } else {
        Ok(ConvergenceResult::Diverged {
            local,
            remote: *remote,
        })
    }
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both registries hold identical anchored records.
    Converged,
    /// The digests differ; more synchronization is needed.
    Diverged { local: Blake3Hash, remote: Blake3Hash },
}

impl ConvergenceResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use didhub_core::{Did, DocAnchor};
    use didhub_store::{MemoryStore, WriteBatch};

    fn registered(sub: &str) -> IdentifierRecord {
        IdentifierRecord::registered(
            Did::method_of("bitxhub", sub),
            Did::new("did:bitxhub:relayroot:0xalice"),
            DocAnchor::new(format!("ipfs://{sub}"), vec![1; 32]).unwrap(),
        )
    }

    async fn store_with(table: &RecordTable, records: &[IdentifierRecord]) -> MemoryStore {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for record in records {
            table.stage_put(&mut batch, record);
        }
        store.write_batch(batch).await.unwrap();
        store
    }

    #[test]
    fn test_digest_order_independent() {
        let (a, b) = (registered("a"), registered("b"));
        assert_eq!(records_digest([&a, &b]), records_digest([&b, &a]));
        assert_ne!(records_digest([&a]), records_digest([&a, &b]));
    }

    #[test]
    fn test_anchored_digest_skips_claims() {
        let a = registered("a");
        let pending = IdentifierRecord::applied(
            Did::method_of("bitxhub", "z"),
            Did::new("did:bitxhub:relayroot:0xbob"),
            1,
        );
        assert_eq!(anchored_digest([&a, &pending]), anchored_digest([&a]));
    }

    #[tokio::test]
    async fn test_convergence() {
        let table = RecordTable::new("method");
        let parent = store_with(&table, &[registered("a"), registered("b")]).await;
        let child = store_with(&table, &[registered("b"), registered("a")]).await;

        let remote = compute_registry_digest(&parent, &table).await.unwrap();
        let result = verify_convergence(&child, &table, &remote).await.unwrap();
        assert!(result.is_converged());

        let lagging = store_with(&table, &[registered("a")]).await;
        let result = verify_convergence(&lagging, &table, &remote).await.unwrap();
        assert!(matches!(result, ConvergenceResult::Diverged { .. }));
    }
}
