//! # DIDHub
//!
//! A governed, hierarchical registry of decentralized identifiers.
//!
//! ## Overview
//!
//! DIDHub keeps three kinds of identifier registries behind one engine:
//!
//! - **Methods**: namespaces such as `did:bitxhub:app:.`
//! - **Chains**: identifiers of the chains that host a method
//! - **Accounts**: identifiers under one method, such as `did:bitxhub:app:0xabc`
//!
//! Each registry is administered by an admin set whose first member, the
//! super admin, cannot be removed. Identifiers move through a claim
//! lifecycle (Apply, AuditApply, Register) and can later be frozen,
//! unfrozen, or deleted by their owner. Registries form a hierarchy: a
//! Register fans the new record out to every child registry, which mirrors
//! it through Synchronize.
//!
//! ## Key Concepts
//!
//! - **Record**: an identifier, its owner, its status and its document anchor.
//! - **Anchor**: the address and hash of an off-registry document.
//! - **Hierarchy**: a registry's parent, its children, and the map from
//!   identifiers to transport addresses.
//! - **Relay**: the collaborator that carries outbound batches to children.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use didhub::{Caller, Did, DocAnchor, MethodRegistry, RegistryConfig};
//! use didhub::store::SqliteStore;
//! use didhub::sync::NullRelay;
//!
//! async fn example() -> didhub::Result<()> {
//!     let store = SqliteStore::open("registry.db")?;
//!     let registry = MethodRegistry::new(store, NullRelay, RegistryConfig::default());
//!
//!     let admin = Caller::from_did(Did::new("did:bitxhub:relayroot:0xadmin"));
//!     registry.init(&admin).await?;
//!
//!     let alice = Caller::from_did(Did::new("did:bitxhub:relayroot:0xalice"));
//!     let app = Did::new("did:bitxhub:app:.");
//!     registry.apply(&alice, &app).await?;
//!     registry.audit_apply(&admin, &app, true).await?;
//!     registry
//!         .register(&alice, &app, DocAnchor::new("ipfs://app", vec![0u8; 32])?)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `didhub::core` - identifiers, statuses, records, documents
//! - `didhub::store` - storage abstraction and SQLite
//! - `didhub::sync` - synchronization messages and relays
//! - `didhub::governance` - admin sets, callers and guards

pub mod config;
pub mod contract;
pub mod error;
pub mod kind;
pub mod registry;
pub mod state;
mod txn;

// Re-export component crates
pub use didhub_core as core;
pub use didhub_governance as governance;
pub use didhub_store as store;
pub use didhub_sync as sync;

pub use config::{RegistryConfig, DEFAULT_RELAY_BROKER};
pub use contract::{
    ChainDidManager, Contract, DidManager, MethodManager, RecordInfo, RegistryContract, Response,
};
pub use error::{AuthFailure, RegistryError, Result};
pub use kind::{AccountKind, ChainKind, IdentifierKind, MethodKind};
pub use registry::{Registration, Registry};
pub use state::{Hierarchy, RegistryState};

pub use didhub_core::{Did, DocAnchor, IdentifierRecord, Status};
pub use didhub_governance::Caller;

/// Method registry engine.
pub type MethodRegistry<S, R> = Registry<MethodKind, S, R>;
/// Chain identifier registry engine.
pub type ChainDidRegistry<S, R> = Registry<ChainKind, S, R>;
/// Account identifier registry engine.
pub type DidRegistry<S, R> = Registry<AccountKind, S, R>;
