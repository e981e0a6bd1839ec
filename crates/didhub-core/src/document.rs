//! Off-chain documents anchored by registry records.
//!
//! The registry never stores a document; it stores a [`DocAnchor`] whose hash
//! is the Blake3 digest of the document's canonical CBOR encoding. Fetchers
//! check content they retrieve with [`Document::verify_against`].

use ciborium::value::Value;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::canonical::{decode_value, encode_canonical};
use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::did::Did;
use crate::error::CoreError;
use crate::record::DocAnchor;

/// A public key listed in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Key reference, e.g. `did:bitxhub:app:0xabc#key-1`.
    pub id: String,
    /// Key algorithm name.
    pub key_type: String,
    /// Raw key material.
    pub public_key: Ed25519PublicKey,
}

impl PublicKeyEntry {
    /// An Ed25519 key entry.
    pub fn ed25519(id: impl Into<String>, public_key: Ed25519PublicKey) -> Self {
        Self {
            id: id.into(),
            key_type: "Ed25519".to_string(),
            public_key,
        }
    }
}

/// A service endpoint listed in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub service_type: String,
    pub endpoint: String,
}

/// Behaviour shared by every document kind.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Short kind name, used in logs.
    const KIND: &'static str;

    /// The identifier this document describes.
    fn subject(&self) -> &Did;

    /// Keys the subject controls.
    fn public_keys(&self) -> &[PublicKeyEntry];

    /// Canonical CBOR bytes of the document.
    fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let value =
            Value::serialized(self).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(encode_canonical(&value))
    }

    /// Parse a document from CBOR bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        decode_value(bytes)?
            .deserialized()
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Blake3 digest of the canonical bytes.
    fn digest(&self) -> Result<Blake3Hash, CoreError> {
        Ok(Blake3Hash::hash(&self.to_bytes()?))
    }

    /// Anchor this document at the given storage address.
    fn anchor(&self, address: impl Into<String>) -> Result<DocAnchor, CoreError> {
        DocAnchor::new(address, self.digest()?.0.to_vec())
    }

    /// Whether this document is the one the anchor points at.
    fn verify_against(&self, anchor: &DocAnchor) -> Result<bool, CoreError> {
        Ok(anchor.matches(&self.to_bytes()?))
    }
}

/// Document of an identifier method (namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDoc {
    pub id: Did,
    pub controller: Did,
    /// Parent registry the method was assigned by.
    pub parent: Option<Did>,
    pub public_keys: Vec<PublicKeyEntry>,
    /// Key ids that may authenticate as the method.
    pub authentication: Vec<String>,
    pub created: i64,
}

impl Document for MethodDoc {
    const KIND: &'static str = "method";

    fn subject(&self) -> &Did {
        &self.id
    }

    fn public_keys(&self) -> &[PublicKeyEntry] {
        &self.public_keys
    }
}

/// Document of a chain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDoc {
    pub id: Did,
    pub controller: Did,
    pub public_keys: Vec<PublicKeyEntry>,
    pub services: Vec<ServiceEndpoint>,
    pub created: i64,
}

impl Document for ChainDoc {
    const KIND: &'static str = "chain";

    fn subject(&self) -> &Did {
        &self.id
    }

    fn public_keys(&self) -> &[PublicKeyEntry] {
        &self.public_keys
    }
}

/// Document of an account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDoc {
    pub id: Did,
    pub controller: Did,
    pub public_keys: Vec<PublicKeyEntry>,
    pub authentication: Vec<String>,
    pub services: Vec<ServiceEndpoint>,
    pub created: i64,
}

impl Document for DidDoc {
    const KIND: &'static str = "did";

    fn subject(&self) -> &Did {
        &self.id
    }

    fn public_keys(&self) -> &[PublicKeyEntry] {
        &self.public_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn sample_doc() -> DidDoc {
        let key = Keypair::from_seed(&[7u8; 32]).public_key();
        DidDoc {
            id: Did::new("did:bitxhub:app:0xabc"),
            controller: Did::new("did:bitxhub:app:0xabc"),
            public_keys: vec![PublicKeyEntry::ed25519("did:bitxhub:app:0xabc#key-1", key)],
            authentication: vec!["did:bitxhub:app:0xabc#key-1".to_string()],
            services: vec![ServiceEndpoint {
                id: "hub".to_string(),
                service_type: "DIDHub".to_string(),
                endpoint: "https://hub.example".to_string(),
            }],
            created: 1_736_870_400_000,
        }
    }

    #[test]
    fn test_document_bytes_deterministic() {
        let doc = sample_doc();
        assert_eq!(doc.to_bytes().unwrap(), sample_doc().to_bytes().unwrap());
    }

    #[test]
    fn test_document_decode() {
        let doc = sample_doc();
        let decoded = DidDoc::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_anchor_verifies_document() {
        let doc = sample_doc();
        let anchor = doc.anchor("ipfs://QmDoc").unwrap();
        assert!(doc.verify_against(&anchor).unwrap());

        let mut tampered = sample_doc();
        tampered.services.clear();
        assert!(!tampered.verify_against(&anchor).unwrap());
    }

    #[test]
    fn test_method_doc_subject() {
        let doc = MethodDoc {
            id: Did::method_of("bitxhub", "app"),
            controller: Did::new("did:bitxhub:relayroot:0xadmin"),
            parent: Some(Did::relay_root()),
            public_keys: Vec::new(),
            authentication: Vec::new(),
            created: 0,
        };
        assert_eq!(doc.subject().as_str(), "did:bitxhub:app:.");
        assert_eq!(MethodDoc::KIND, "method");
    }
}
