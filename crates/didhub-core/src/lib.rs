//! # DIDHub Core
//!
//! Pure primitives for DIDHub: identifiers, records, the status machine, and
//! canonicalization.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Did`] - Namespaced identifier `did:<root>:<sub>:<address>`
//! - [`Status`] - Lifecycle status and its legal transitions
//! - [`IdentifierRecord`] - Per-identifier registry state
//! - [`DocAnchor`] - Off-chain document address plus content hash
//!
//! ## Canonicalization
//!
//! Records are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod did;
pub mod document;
pub mod error;
pub mod record;
pub mod status;
pub mod validation;

pub use canonical::{decode_record, encode_canonical, record_bytes};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use did::{Did, METHOD_ADDRESS, RELAY_ROOT};
pub use document::{ChainDoc, DidDoc, Document, MethodDoc, PublicKeyEntry, ServiceEndpoint};
pub use error::{CoreError, ValidationError};
pub use record::{Application, DocAnchor, IdentifierRecord};
pub use status::Status;
pub use validation::{validate_mirrored_record, validate_record};
