//! Error types for registry operations.

use std::fmt;

use didhub_core::{CoreError, Did, Status, ValidationError};
use didhub_governance::GovernanceError;
use didhub_store::StoreError;
use didhub_sync::SyncError;
use thiserror::Error;

/// Why an authorization guard refused a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    NotAdmin,
    NotSuperAdmin,
    NotOwner { id: Did, owner: Did },
    NotAdminOrOwner { id: Did },
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::NotAdmin => write!(f, "not an admin"),
            AuthFailure::NotSuperAdmin => write!(f, "not the super admin"),
            AuthFailure::NotOwner { id, owner } => {
                write!(f, "not the owner of {id} (owner {owner})")
            }
            AuthFailure::NotAdminOrOwner { id } => {
                write!(f, "neither an admin nor the owner of {id}")
            }
        }
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{registry} registry not initialized")]
    NotInitialized { registry: &'static str },

    #[error("{registry} registry already initialized")]
    AlreadyInitialized { registry: &'static str },

    /// The invoking address does not derive the claimed identity.
    #[error("caller address {address} does not control {claimed}")]
    CallerMismatch { address: String, claimed: Did },

    #[error("{caller} is not authorized: {reason}")]
    NotAuthorized { caller: Did, reason: AuthFailure },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("record not found: {0}")]
    RecordNotFound(Did),

    #[error("illegal transition for {id}: {from} -> {to}")]
    IllegalTransition { id: Did, from: Status, to: Status },

    #[error("{0} is already frozen")]
    AlreadyFrozen(Did),

    #[error("{0} is not frozen")]
    NotFrozen(Did),

    #[error("{id} is already claimed ({status})")]
    AlreadyClaimed { id: Did, status: Status },

    #[error("{id} is not awaiting audit ({status})")]
    NotInApplicationState { id: Did, status: Status },

    #[error("{id} is not registered ({status})")]
    NotRegistered { id: Did, status: Status },

    #[error("{0} is an admin, remove it from the admin set first")]
    AdminMustBeRemovedFirst(Did),

    #[error("super admin {0} cannot be removed")]
    CannotRemoveSuperAdmin(Did),

    #[error("{0} is not an admin")]
    NotAnAdmin(Did),

    /// The registry's own identifier cannot be deleted.
    #[error("{0} is this registry's own identifier")]
    SelfIdentifier(Did),

    #[error("signature from {caller} rejected: {reason}")]
    SignatureRejected { caller: Did, reason: String },

    #[error("document for {id} rejected: {reason}")]
    DocumentMismatch { id: Did, reason: String },

    #[error("deserialization failure: {0}")]
    DeserializationFailure(String),

    /// The local change committed but the relay did not take the batch.
    #[error("delivery of {id} to {broker} failed: {reason}")]
    DownstreamDeliveryFailure {
        id: Did,
        broker: String,
        reason: String,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(ValidationError),

    #[error("sync error: {0}")]
    Sync(SyncError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl RegistryError {
    /// Whether the error is a refused status change.
    pub fn is_illegal_transition(&self) -> bool {
        matches!(
            self,
            RegistryError::IllegalTransition { .. }
                | RegistryError::AlreadyFrozen(_)
                | RegistryError::NotFrozen(_)
                | RegistryError::AlreadyClaimed { .. }
                | RegistryError::NotInApplicationState { .. }
                | RegistryError::NotRegistered { .. }
        )
    }

    /// Whether the caller was refused by an authorization guard.
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, RegistryError::NotAuthorized { .. })
    }
}

impl From<GovernanceError> for RegistryError {
    fn from(e: GovernanceError) -> Self {
        match e {
            GovernanceError::CallerMismatch { address, claimed } => {
                RegistryError::CallerMismatch { address, claimed }
            }
            GovernanceError::NotAdmin(caller) => RegistryError::NotAuthorized {
                caller,
                reason: AuthFailure::NotAdmin,
            },
            GovernanceError::NotSuperAdmin(caller) => RegistryError::NotAuthorized {
                caller,
                reason: AuthFailure::NotSuperAdmin,
            },
            GovernanceError::NotOwner { caller, id, owner } => RegistryError::NotAuthorized {
                caller,
                reason: AuthFailure::NotOwner { id, owner },
            },
            GovernanceError::NotAdminOrOwner { caller, id } => RegistryError::NotAuthorized {
                caller,
                reason: AuthFailure::NotAdminOrOwner { id },
            },
            GovernanceError::CannotRemoveSuperAdmin(did) => {
                RegistryError::CannotRemoveSuperAdmin(did)
            }
            GovernanceError::NotAnAdmin(did) => RegistryError::NotAnAdmin(did),
            GovernanceError::UnknownSigner(caller) => RegistryError::SignatureRejected {
                caller,
                reason: "no key enrolled".to_string(),
            },
            GovernanceError::SignatureRejected { caller, reason } => {
                RegistryError::SignatureRejected { caller, reason }
            }
            GovernanceError::Core(e) => e.into(),
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::IllegalTransition { id, from, to } => {
                RegistryError::IllegalTransition { id, from, to }
            }
            other => RegistryError::InvalidRecord(other),
        }
    }
}

impl From<CoreError> for RegistryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::DecodingError(_) | CoreError::MalformedRecord(_) => {
                RegistryError::DeserializationFailure(e.to_string())
            }
            other => RegistryError::InvalidFormat(other.to_string()),
        }
    }
}

impl From<SyncError> for RegistryError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Decode(e) => RegistryError::DeserializationFailure(e.to_string()),
            SyncError::InvalidMessage(reason) => RegistryError::DeserializationFailure(reason),
            SyncError::Validation(e) => e.into(),
            SyncError::Store(e) => RegistryError::Store(e),
            other => RegistryError::Sync(other),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Did {
        Did::new("did:bitxhub:relayroot:0xalice")
    }

    #[test]
    fn test_governance_mapping() {
        let err: RegistryError = GovernanceError::NotAdmin(alice()).into();
        assert!(err.is_not_authorized());
        assert!(err.to_string().contains("0xalice"));

        let err: RegistryError = GovernanceError::NotOwner {
            caller: alice(),
            id: Did::new("did:bitxhub:app:."),
            owner: Did::new("did:bitxhub:relayroot:0xbob"),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("did:bitxhub:app:."));
        assert!(text.contains("0xbob"));

        let err: RegistryError = GovernanceError::CannotRemoveSuperAdmin(alice()).into();
        assert!(matches!(err, RegistryError::CannotRemoveSuperAdmin(_)));
    }

    #[test]
    fn test_illegal_transition_family() {
        let id = Did::new("did:bitxhub:app:.");
        assert!(RegistryError::AlreadyFrozen(id.clone()).is_illegal_transition());
        assert!(RegistryError::NotFrozen(id.clone()).is_illegal_transition());
        assert!(RegistryError::AlreadyClaimed {
            id: id.clone(),
            status: Status::Applied
        }
        .is_illegal_transition());
        let err: RegistryError = ValidationError::IllegalTransition {
            id: id.clone(),
            from: Status::Applied,
            to: Status::Frozen,
        }
        .into();
        assert!(err.is_illegal_transition());
        assert!(!RegistryError::RecordNotFound(id).is_illegal_transition());
    }

    #[test]
    fn test_decode_errors_map_to_deserialization() {
        let err: RegistryError = CoreError::DecodingError("eof".into()).into();
        assert!(matches!(err, RegistryError::DeserializationFailure(_)));
        let err: RegistryError = SyncError::Decode(CoreError::MalformedRecord("x".into())).into();
        assert!(matches!(err, RegistryError::DeserializationFailure(_)));
    }
}
