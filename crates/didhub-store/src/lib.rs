//! # DIDHub Store
//!
//! Storage abstraction for DIDHub registries. Provides a trait-based interface
//! over an ordered key-value map with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`WriteBatch`] - Writes applied atomically in one call
//! - [`RecordTable`] - Typed identifier-record access for one registry kind
//!
//! ## Usage
//!
//! ```rust,no_run
//! use didhub_store::{SqliteStore, Store, StoreExt};
//!
//! async fn example() -> didhub_store::Result<()> {
//!     let store = SqliteStore::open("registry.db")?;
//!     store.set_object("greeting", &"hello".to_string()).await?;
//!     let back: Option<String> = store.get_object("greeting").await?;
//!     assert_eq!(back.as_deref(), Some("hello"));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::RecordTable;
pub use sqlite::SqliteStore;
pub use traits::{decode_object, encode_object, BatchOp, Store, StoreExt, WriteBatch};
