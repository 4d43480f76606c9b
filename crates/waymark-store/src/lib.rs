//! # Waymark Store
//!
//! Storage abstraction for the Waymark registry. Provides a trait-based
//! interface for stream, checkpoint, tag, entitlement, and envelope
//! persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts registry storage behind the [`Store`] trait,
//! allowing the registry to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! Each write method is a single transaction covering everything one
//! registry mutation touches. A call either commits all of its rows or
//! none of them, which is what lets the registry roll a failed command
//! back by simply not calling the store.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertOutcome`] - Result of inserting a stream record
//! - [`AppendResult`] - Result of appending a checkpoint
//!
//! ## Usage
//!
//! ```rust,no_run
//! use waymark_store::{SqliteStore, Store, AppendResult};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("waymark.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     // Append a sealed checkpoint
//!     // let checkpoint: Checkpoint = ...;
//!     // let result = store.append_checkpoint(&checkpoint, None).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Registry-global ids**: checkpoint ids are unique across all streams,
//!   not per stream
//! - **Write-once rows**: consumption and envelope inserts never overwrite;
//!   a duplicate insert reports `false` and leaves the original intact
//! - **Scope sentinel**: stream-wide consumption is stored under the all-zero
//!   checkpoint id

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, InsertOutcome, Store};
