//! # DIDHub Sync
//!
//! Cross-registry synchronization for hierarchical identifier registries.
//!
//! ## Overview
//!
//! When a registry registers an identifier, every child registry must learn
//! about it. The parent builds one propagate message per child, groups them
//! in a [`MessageBatch`], and hands the batch to a relay broker through the
//! [`Relay`] trait. On the child, the message's payload becomes a
//! `Synchronize(fromID, recordBytes)` call.
//!
//! ## Key Properties
//!
//! - **One message per child**: a batch addresses each distinct child once
//! - **Monotonic**: timestamps from one sender strictly increase
//! - **Deterministic**: messages and records encode to canonical CBOR
//! - **Verifiable**: registries compare record digests to confirm they converged
//!
//! ## Message Flow
//!
//! ```text
//! Parent registry            Relay broker              Child registry
//!   |-- RecordIBTPs(batch) ----->|                          |
//!   |                            |-- Synchronize(from, r) ->|
//! ```

pub mod convergence;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use convergence::{
    anchored_digest, compute_registry_digest, records_digest, verify_convergence,
    ConvergenceResult,
};
pub use error::{Result, SyncError};
pub use messages::{
    MessageBatch, MessageKind, Payload, SyncMessage, PROTOCOL_VERSION, RECORD_BATCH_FN,
    SYNCHRONIZE_FN,
};
pub use protocol::{
    decode_inbound, decode_synchronize_args, transport_address, MonotonicClock, Propagator, Route,
    SyncConfig,
};
pub use transport::{memory::MemoryRelay, NullRelay, Relay};
