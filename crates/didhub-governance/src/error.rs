//! Error types for the governance module.

use didhub_core::Did;
use thiserror::Error;

/// Errors that can occur during authorization checks and admin management.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The invoking address does not derive the claimed identity.
    #[error("caller address {address} does not control {claimed}")]
    CallerMismatch { address: String, claimed: Did },

    /// Caller is not in the admin set.
    #[error("{0} is not an admin")]
    NotAdmin(Did),

    /// Caller is not the super admin.
    #[error("{0} is not the super admin")]
    NotSuperAdmin(Did),

    /// Caller does not own the record.
    #[error("{caller} is not the owner of {id} (owner {owner})")]
    NotOwner { caller: Did, id: Did, owner: Did },

    /// Caller is neither an admin nor the record owner.
    #[error("{caller} is neither an admin nor the owner of {id}")]
    NotAdminOrOwner { caller: Did, id: Did },

    /// The super admin can never leave the admin set.
    #[error("super admin {0} cannot be removed")]
    CannotRemoveSuperAdmin(Did),

    /// Removal target is not an admin.
    #[error("{0} is not an admin")]
    NotAnAdmin(Did),

    /// No key is enrolled for the signer.
    #[error("no key enrolled for {0}")]
    UnknownSigner(Did),

    /// A signature was missing or did not verify.
    #[error("signature from {caller} rejected: {reason}")]
    SignatureRejected { caller: Did, reason: String },

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] didhub_core::CoreError),
}

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
