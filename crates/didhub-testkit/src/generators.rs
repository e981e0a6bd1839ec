//! Proptest generators for property-based testing.

use proptest::prelude::*;

use didhub_core::{Blake3Hash, Did, DocAnchor, IdentifierRecord, Status};

/// A method or root name segment.
pub fn name_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

/// An account address segment.
pub fn address_segment() -> impl Strategy<Value = String> {
    "0x[0-9a-f]{4,40}".prop_map(String::from)
}

/// A well-formed method identifier.
pub fn method_did() -> impl Strategy<Value = Did> {
    (name_segment(), name_segment()).prop_map(|(root, sub)| Did::method_of(&root, &sub))
}

/// A well-formed account identifier.
pub fn account_did() -> impl Strategy<Value = Did> {
    (method_did(), address_segment())
        .prop_filter_map("method form", |(method, address)| {
            Did::account_of(&method, &address)
        })
}

/// Any status.
pub fn status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

/// A persistable (non-unclaimed) status.
pub fn stored_status() -> impl Strategy<Value = Status> {
    status().prop_filter("unclaimed is never stored", |s| *s != Status::Unclaimed)
}

/// A non-empty document anchor.
pub fn doc_anchor() -> impl Strategy<Value = DocAnchor> {
    ("ipfs://[a-z0-9]{1,32}", any::<[u8; 32]>()).prop_map(|(address, hash)| DocAnchor {
        address,
        hash: hash.to_vec(),
    })
}

/// Parameters for generating a record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub id: Did,
    pub owner: Did,
    pub status: Status,
    pub doc: DocAnchor,
    pub applied_at: i64,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            method_did(),
            account_did(),
            stored_status(),
            doc_anchor(),
            0i64..=1_700_000_000_000i64,
        )
            .prop_map(|(id, owner, status, doc, applied_at)| RecordParams {
                id,
                owner,
                status,
                doc,
                applied_at,
            })
            .boxed()
    }
}

/// Build a record that passes validation for the generated status.
pub fn record_from_params(params: &RecordParams) -> IdentifierRecord {
    let mut record = if params.status.is_claim_phase() {
        IdentifierRecord::applied(params.id.clone(), params.owner.clone(), params.applied_at)
    } else {
        IdentifierRecord::registered(params.id.clone(), params.owner.clone(), params.doc.clone())
    };
    record.status = params.status;
    record
}

/// Distinct anchored records, one per generated identifier.
pub fn anchored_records(max: usize) -> impl Strategy<Value = Vec<IdentifierRecord>> {
    prop::collection::btree_map(method_did(), (account_did(), doc_anchor()), 0..=max).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(id, (owner, doc))| IdentifierRecord::registered(id, owner, doc))
                .collect()
        },
    )
}

/// A random digest.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}
