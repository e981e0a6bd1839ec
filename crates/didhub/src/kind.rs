//! Identifier kinds.
//!
//! The three registries share one engine and differ only in the identifiers
//! they hold, the document type those identifiers anchor, and a couple of
//! rules around registration. Each difference is a constant or a function of
//! [`IdentifierKind`].

use didhub_core::{ChainDoc, Did, DidDoc, Document, MethodDoc};

use crate::error::{RegistryError, Result};

/// What distinguishes one registry variant from another.
pub trait IdentifierKind: Send + Sync + 'static {
    /// Document type the identifiers anchor.
    type Document: Document;

    /// Short name, used for record keys and logs.
    const NAME: &'static str;

    /// Object key of the aggregate registry state.
    const STATE_KEY: &'static str;

    /// Default contract address of the registry.
    const CONTRACT_ADDRESS: &'static str;

    /// A caller may register its own identifier without applying first.
    const SELF_REGISTRATION: bool;

    /// Only the owner may Register or Update; admins may not act for them.
    const OWNER_ONLY: bool;

    /// The contract surface exposes GetMethodID and SetMethodID.
    const RETARGETABLE: bool = false;

    /// Identifier the registry serves, derived from the first admin.
    fn self_id(admin: &Did) -> Option<Did> {
        admin.method()
    }

    /// Identifier of the genesis record.
    fn genesis_id(admin: &Did, self_id: &Did) -> Did;

    /// Whether `id` may live in a registry serving `self_id`.
    fn validate_id(id: &Did, self_id: &Did) -> Result<()>;
}

/// Registry of identifier methods (namespaces).
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodKind;

impl IdentifierKind for MethodKind {
    type Document = MethodDoc;

    const NAME: &'static str = "method";
    const STATE_KEY: &'static str = "MethodRegistry";
    const CONTRACT_ADDRESS: &'static str = "method-registry";
    const SELF_REGISTRATION: bool = false;
    const OWNER_ONLY: bool = true;

    fn genesis_id(_admin: &Did, self_id: &Did) -> Did {
        self_id.clone()
    }

    fn validate_id(id: &Did, _self_id: &Did) -> Result<()> {
        require_method_form(id)
    }
}

/// Registry of chain identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainKind;

impl IdentifierKind for ChainKind {
    type Document = ChainDoc;

    const NAME: &'static str = "chain";
    const STATE_KEY: &'static str = "ChainDIDRegistry";
    const CONTRACT_ADDRESS: &'static str = "chain-did-registry";
    const SELF_REGISTRATION: bool = false;
    const OWNER_ONLY: bool = false;

    fn genesis_id(_admin: &Did, self_id: &Did) -> Did {
        self_id.clone()
    }

    fn validate_id(id: &Did, _self_id: &Did) -> Result<()> {
        require_method_form(id)
    }
}

/// Registry of account identifiers under one method.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountKind;

impl IdentifierKind for AccountKind {
    type Document = DidDoc;

    const NAME: &'static str = "did";
    const STATE_KEY: &'static str = "DIDRegistry";
    const CONTRACT_ADDRESS: &'static str = "did-registry";
    const SELF_REGISTRATION: bool = true;
    const OWNER_ONLY: bool = true;
    const RETARGETABLE: bool = true;

    fn genesis_id(admin: &Did, _self_id: &Did) -> Did {
        admin.clone()
    }

    fn validate_id(id: &Did, self_id: &Did) -> Result<()> {
        if !id.is_account_form() {
            return Err(RegistryError::InvalidFormat(format!(
                "{id} is not an account identifier"
            )));
        }
        if !id.belongs_to(self_id) {
            return Err(RegistryError::InvalidFormat(format!(
                "{id} does not live under {self_id}"
            )));
        }
        Ok(())
    }
}

fn require_method_form(id: &Did) -> Result<()> {
    if id.is_method_form() {
        Ok(())
    } else {
        Err(RegistryError::InvalidFormat(format!(
            "{id} is not a method identifier"
        )))
    }
}
