//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur while building, delivering, or reading sync messages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The payload names a function other than the one expected.
    #[error("unexpected function {got}, expected {expected}")]
    UnexpectedFunction { expected: String, got: String },

    /// The payload carries the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    /// More children than one batch may address.
    #[error("{count} children exceed the fan-out limit of {max}")]
    TooManyChildren { count: usize, max: usize },

    /// The relay broker refused or failed the delivery.
    #[error("relay {broker} failed: {reason}")]
    Relay { broker: String, reason: String },

    /// Record or message bytes failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] didhub_core::CoreError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] didhub_store::StoreError),

    /// Record validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] didhub_core::ValidationError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
