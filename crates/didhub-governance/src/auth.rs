//! Caller identity and authorization guards.
//!
//! A caller proves control of an identity by invoking from the address
//! embedded in it. This is a derivation check on strings; cryptographic proof,
//! when enabled, goes through [`crate::signature::SignatureCheck`].

use didhub_core::{Did, Ed25519Signature, IdentifierRecord};

use crate::admins::AdminSet;
use crate::error::{GovernanceError, Result};

/// The identity behind one registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Address the host reports as the invoker.
    pub address: String,
    /// Identity the invoker claims.
    pub did: Did,
    /// Optional signature over the operation message.
    pub signature: Option<Ed25519Signature>,
}

impl Caller {
    /// A caller without a signature.
    pub fn new(address: impl Into<String>, did: Did) -> Self {
        Self {
            address: address.into(),
            did,
            signature: None,
        }
    }

    /// A caller whose address is taken from the claimed identity.
    pub fn from_did(did: Did) -> Self {
        let address = did.address().unwrap_or_default().to_string();
        Self::new(address, did)
    }

    /// Attach a signature.
    pub fn with_signature(mut self, signature: Ed25519Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Check that the invoking address derives the claimed identity.
    pub fn verify_derivation(&self) -> Result<()> {
        if self.did.is_valid_format() && self.did.is_controlled_by(&self.address) {
            Ok(())
        } else {
            Err(GovernanceError::CallerMismatch {
                address: self.address.clone(),
                claimed: self.did.clone(),
            })
        }
    }
}

/// Require the caller to be an admin.
pub fn require_admin(admins: &AdminSet, caller: &Did) -> Result<()> {
    if admins.contains(caller) {
        Ok(())
    } else {
        Err(GovernanceError::NotAdmin(caller.clone()))
    }
}

/// Require the caller to be the super admin.
pub fn require_super_admin(admins: &AdminSet, caller: &Did) -> Result<()> {
    if admins.is_super_admin(caller) {
        Ok(())
    } else {
        Err(GovernanceError::NotSuperAdmin(caller.clone()))
    }
}

/// Require the caller to own the record.
pub fn require_owner(record: &IdentifierRecord, caller: &Did) -> Result<()> {
    if &record.owner == caller {
        Ok(())
    } else {
        Err(GovernanceError::NotOwner {
            caller: caller.clone(),
            id: record.id.clone(),
            owner: record.owner.clone(),
        })
    }
}

/// Require the caller to be an admin or the record owner.
pub fn require_admin_or_owner(
    admins: &AdminSet,
    record: &IdentifierRecord,
    caller: &Did,
) -> Result<()> {
    if admins.contains(caller) || &record.owner == caller {
        Ok(())
    } else {
        Err(GovernanceError::NotAdminOrOwner {
            caller: caller.clone(),
            id: record.id.clone(),
        })
    }
}
