//! # DIDHub Governance
//!
//! Who may do what to a registry.
//!
//! ## Key Concepts
//!
//! - **Admin set**: ordered, duplicate-free; element 0 is the super admin,
//!   who alone may add or remove admins and who can never be removed
//! - **Caller derivation**: a caller proves control of an identity by
//!   invoking from the address embedded in it
//! - **Guards**: admin, super admin, owner, and admin-or-owner checks
//! - **Signature hook**: an optional check of a caller's signature over the
//!   canonical operation message

pub mod admins;
pub mod auth;
pub mod error;
pub mod signature;

pub use admins::AdminSet;
pub use auth::{require_admin, require_admin_or_owner, require_owner, require_super_admin, Caller};
pub use error::{GovernanceError, Result};
pub use signature::{operation_message, AcceptAll, Ed25519KeyRing, SignatureCheck};
