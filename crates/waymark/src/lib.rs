//! # Waymark
//!
//! The unified API for the Waymark system - tamper-evident checkpoint
//! chains with entitlement-gated key delivery.
//!
//! ## Overview
//!
//! Waymark lets a single authorized publisher per stream:
//!
//! - **Checkpoints**: Append content-addressed, hash-linked records to a
//!   permanent, ordered chain
//! - **Tags**: Bind mutable human-readable names to checkpoints, one
//!   checkpoint per tag and one tag per checkpoint
//! - **Entitlements**: Gate consumption by burn-to-consume counting, a
//!   balance threshold, or a publisher-managed allowlist
//! - **Envelopes**: Deliver externally-wrapped decryption keys to entitled
//!   consumers, write-once per (consumer, checkpoint)
//!
//! ## Key Concepts
//!
//! - **Checkpoint**: Immutable except for its storage pointer, which is
//!   excluded from the identity derivation.
//! - **Stream**: Owned by a single publisher. Chain positions are dense
//!   and 0-based; the registry-wide sequence marker never repeats.
//! - **Consumption**: Monotonic. A counted (account, scope) pair flips to
//!   consumed exactly once and never resets.
//! - **Delivery**: Write-once. A (consumer, checkpoint) envelope can never
//!   be replaced.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use waymark::{Registry, RegistryConfig};
//! use waymark::access::NullTokenLedger;
//! use waymark::core::{AccountId, CheckpointDraft, Digest, EntitlementPolicy};
//! use waymark::store::SqliteStore;
//!
//! async fn example() {
//!     // Open storage
//!     let store = SqliteStore::open("waymark.db").unwrap();
//!
//!     // Create the registry (allowlist streams need no token ledger)
//!     let registry = Registry::new(
//!         store,
//!         Arc::new(NullTokenLedger),
//!         RegistryConfig::default(),
//!     );
//!
//!     // Create a stream
//!     let publisher = AccountId::from_bytes([1; 32]);
//!     let stream_id = registry
//!         .create_stream(&publisher, "telemetry", EntitlementPolicy::Allowlist { open: true })
//!         .await
//!         .unwrap();
//!
//!     // Publish a checkpoint
//!     let draft = CheckpointDraft::new(
//!         Digest::hash(b"state"),
//!         Digest::hash(b"ciphertext"),
//!         "ipfs://bafy...",
//!         Digest::hash(b"manifest"),
//!     );
//!     let checkpoint_id = registry.publish(&stream_id, &publisher, draft).await.unwrap();
//!     let _ = checkpoint_id;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `waymark::core` - Core primitives (Checkpoint, StreamId, policies)
//! - `waymark::access` - Entitlement capabilities and key envelopes
//! - `waymark::store` - Storage abstraction, SQLite and in-memory backends

pub mod error;
pub mod events;
pub mod registry;

// Re-export component crates
pub use waymark_access as access;
pub use waymark_core as core;
pub use waymark_store as store;

// Re-export main types for convenience
pub use error::{RegistryError, Result};
pub use events::Event;
pub use registry::{ChainReport, Registry, RegistryConfig};

// Re-export commonly used core types
pub use waymark_core::{
    AccountId, Checkpoint, CheckpointDraft, CheckpointId, ConsumeScope, Digest,
    EntitlementPolicy, StreamId, StreamRecord, TagShift,
};
