//! Error types for DIDHub Core.

use thiserror::Error;

use crate::did::Did;
use crate::status::Status;

/// Core errors that can occur while building or decoding registry data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier format: {0}")]
    InvalidDid(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid document anchor: {0}")]
    InvalidAnchor(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for record structure and status transitions.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("illegal transition for {id}: {from} -> {to}")]
    IllegalTransition { id: Did, from: Status, to: Status },

    #[error("record {0} is registered without a document anchor")]
    MissingAnchor(Did),

    #[error("record {0} carries an invalid identifier")]
    InvalidId(Did),

    #[error("record {id} has an invalid owner {owner}")]
    InvalidOwner { id: Did, owner: Did },

    #[error("record {0} cannot persist in the unclaimed state")]
    UnclaimedRecord(Did),

    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        ValidationError::StructuralError(e.to_string())
    }
}
