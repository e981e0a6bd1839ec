//! Signature hook for registry operations.
//!
//! Registries consult a [`SignatureCheck`] before signed operations when
//! signature verification is enabled. [`AcceptAll`] leaves the hook open;
//! [`Ed25519KeyRing`] verifies an Ed25519 signature over
//! [`operation_message`] for callers with an enrolled key.

use std::collections::BTreeMap;

use ciborium::value::Value;
use didhub_core::{encode_canonical, Did, Ed25519PublicKey};

use crate::auth::Caller;
use crate::error::{GovernanceError, Result};

/// Canonical bytes a caller signs for one operation.
///
/// CBOR array `[registry, function, caller, args...]`.
pub fn operation_message(registry: &str, function: &str, caller: &Did, args: &[&str]) -> Vec<u8> {
    let mut items = Vec::with_capacity(args.len() + 3);
    items.push(Value::Text(registry.to_string()));
    items.push(Value::Text(function.to_string()));
    items.push(Value::Text(caller.as_str().to_string()));
    items.extend(args.iter().map(|a| Value::Text((*a).to_string())));
    encode_canonical(&Value::Array(items))
}

/// Decides whether a caller's signature over an operation is acceptable.
pub trait SignatureCheck: Send + Sync {
    /// Check the caller's signature over `message`.
    fn check(&self, caller: &Caller, message: &[u8]) -> Result<()>;
}

/// Accepts every call without looking at signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SignatureCheck for AcceptAll {
    fn check(&self, _caller: &Caller, _message: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Verifies Ed25519 signatures against enrolled keys.
#[derive(Debug, Clone, Default)]
pub struct Ed25519KeyRing {
    keys: BTreeMap<Did, Ed25519PublicKey>,
}

impl Ed25519KeyRing {
    /// Create an empty key ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll (or replace) the key of an identity.
    pub fn enroll(&mut self, did: Did, key: Ed25519PublicKey) -> Option<Ed25519PublicKey> {
        self.keys.insert(did, key)
    }

    /// Remove the key of an identity.
    pub fn revoke(&mut self, did: &Did) -> Option<Ed25519PublicKey> {
        self.keys.remove(did)
    }

    /// The enrolled key of an identity.
    pub fn key_of(&self, did: &Did) -> Option<&Ed25519PublicKey> {
        self.keys.get(did)
    }
}

impl SignatureCheck for Ed25519KeyRing {
    fn check(&self, caller: &Caller, message: &[u8]) -> Result<()> {
        let key = self
            .key_of(&caller.did)
            .ok_or_else(|| GovernanceError::UnknownSigner(caller.did.clone()))?;
        let signature = caller
            .signature
            .as_ref()
            .ok_or_else(|| GovernanceError::SignatureRejected {
                caller: caller.did.clone(),
                reason: "missing signature".to_string(),
            })?;
        key.verify(message, signature)
            .map_err(|e| GovernanceError::SignatureRejected {
                caller: caller.did.clone(),
                reason: e.to_string(),
            })
    }
}
