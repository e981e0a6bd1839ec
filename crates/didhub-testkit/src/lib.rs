//! # DIDHub Testkit
//!
//! Testing utilities for DIDHub.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: identities, shared stores and relays, registries wired to them
//! - **Federations**: a parent method registry with mirroring children
//! - **Generators**: proptest strategies for identifiers and records
//!
//! ## Test Fixtures
//!
//! ```rust
//! use didhub_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let registry = fixture.method_registry();
//! let alice = fixture.user("0xalice");
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use didhub_testkit::generators::{record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn record_bytes_are_deterministic(params: RecordParams) {
//!         let record = record_from_params(&params);
//!         prop_assert_eq!(record.digest(), record.clone().digest());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{anchor, identities, Federation, Identity, TestFixture};
pub use generators::{record_from_params, RecordParams};
