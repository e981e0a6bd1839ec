//! Identifier records: the per-identifier state a registry keeps.

use serde::{Deserialize, Serialize};

use crate::crypto::Blake3Hash;
use crate::did::Did;
use crate::error::{CoreError, ValidationError};
use crate::status::Status;

/// Current record encoding version.
pub const RECORD_VERSION: u8 = 0;

/// Pointer to off-chain document content plus its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocAnchor {
    /// Where the document is stored (e.g. `ipfs://...`).
    pub address: String,
    /// Content digest of the document.
    pub hash: Vec<u8>,
}

impl DocAnchor {
    /// Create an anchor. Both address and hash must be non-empty.
    pub fn new(address: impl Into<String>, hash: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let address = address.into();
        let hash = hash.into();
        if address.is_empty() {
            return Err(CoreError::InvalidAnchor("empty document address".into()));
        }
        if hash.is_empty() {
            return Err(CoreError::InvalidAnchor(format!(
                "empty document hash for {address}"
            )));
        }
        Ok(Self { address, hash })
    }

    /// Anchor for a placeholder document with no content yet.
    ///
    /// The hash is the Blake3 digest of the address itself, so the anchor
    /// is never empty.
    pub fn placeholder(address: impl Into<String>) -> Self {
        let address = address.into();
        let hash = Blake3Hash::hash(address.as_bytes()).0.to_vec();
        Self { address, hash }
    }

    /// Whether the given document bytes hash to this anchor.
    pub fn matches(&self, document: &[u8]) -> bool {
        Blake3Hash::hash(document).as_bytes().as_slice() == self.hash.as_slice()
    }

    /// Hex encoding of the hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }
}

/// Metadata kept while a claim is in the audit phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// When the claim was filed (Unix ms).
    pub applied_at: i64,
    /// Admins that audited the claim, in order.
    pub auditors: Vec<Did>,
}

/// State of a single identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    /// The identifier itself.
    pub id: Did,
    /// The controlling entity.
    pub owner: Did,
    /// Current status.
    pub status: Status,
    /// Anchored document, once registered.
    pub doc: Option<DocAnchor>,
    /// Claim metadata while applying.
    pub application: Option<Application>,
}

impl IdentifierRecord {
    /// A freshly applied claim.
    pub fn applied(id: Did, owner: Did, applied_at: i64) -> Self {
        Self {
            id,
            owner,
            status: Status::Applied,
            doc: None,
            application: Some(Application {
                applied_at,
                auditors: Vec::new(),
            }),
        }
    }

    /// A record registered directly (genesis and self-registration).
    pub fn registered(id: Did, owner: Did, doc: DocAnchor) -> Self {
        Self {
            id,
            owner,
            status: Status::Registered,
            doc: Some(doc),
            application: None,
        }
    }

    /// Document address, if anchored.
    pub fn doc_address(&self) -> Option<&str> {
        self.doc.as_ref().map(|d| d.address.as_str())
    }

    /// Document hash, if anchored.
    pub fn doc_hash(&self) -> Option<&[u8]> {
        self.doc.as_ref().map(|d| d.hash.as_slice())
    }

    /// Move along a legal edge of the state machine.
    pub fn transition(&mut self, to: Status) -> Result<Status, ValidationError> {
        let from = self.status;
        if !from.can_transition(to) {
            return Err(ValidationError::IllegalTransition {
                id: self.id.clone(),
                from,
                to,
            });
        }
        if to == Status::Registered && self.doc.is_none() {
            return Err(ValidationError::MissingAnchor(self.id.clone()));
        }
        self.status = to;
        Ok(from)
    }

    /// Anchor a document and move an approved claim to `Registered`.
    ///
    /// Only `Approved` qualifies. `Frozen -> Registered` is an unfreeze and
    /// stays with the admin paths.
    pub fn register(&mut self, doc: DocAnchor) -> Result<(), ValidationError> {
        if self.status != Status::Approved {
            return Err(ValidationError::IllegalTransition {
                id: self.id.clone(),
                from: self.status,
                to: Status::Registered,
            });
        }
        self.doc = Some(doc);
        self.application = None;
        self.status = Status::Registered;
        Ok(())
    }

    /// Record an auditor on the pending application.
    pub fn note_auditor(&mut self, auditor: Did) {
        self.application
            .get_or_insert_with(Application::default)
            .auditors
            .push(auditor);
    }

    /// Blake3 digest of the canonical encoding.
    pub fn digest(&self) -> Blake3Hash {
        Blake3Hash::hash(&crate::canonical::record_bytes(self))
    }
}
