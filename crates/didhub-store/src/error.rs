use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    /// A state object did not encode or decode as CBOR.
    #[error("object encoding failed: {0}")]
    Serialization(String),

    /// Bytes under `key` are not what the key promises.
    #[error("corrupt value at {key}: {reason}")]
    InvalidData { key: String, reason: String },

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking SQLite task could not be joined.
    #[error("blocking task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
