//! # Waymark Core
//!
//! Pure primitives for the Waymark ledger: checkpoints, streams, tags, and
//! entitlement policies.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over hashed data structures.
//!
//! ## Key Types
//!
//! - [`Checkpoint`] - One immutable, hash-linked record in a stream's chain
//! - [`CheckpointId`] - Content- and context-derived identifier (Blake3)
//! - [`StreamId`] - Identifier for one checkpoint chain
//! - [`TagMap`] - Bidirectional label registry for one stream
//! - [`EntitlementPolicy`] - Who may consume delivered key material
//!
//! ## Canonicalization
//!
//! Identifier preimages are encoded using deterministic CBOR. See the
//! [`canonical`] module.

pub mod canonical;
pub mod checkpoint;
pub mod entitlement;
pub mod error;
pub mod stream;
pub mod tags;
pub mod types;

pub use canonical::{
    checkpoint_preimage, derive_checkpoint_id, CHECKPOINT_ID_DOMAIN, STREAM_ID_DOMAIN,
};
pub use checkpoint::{Checkpoint, CheckpointDraft};
pub use entitlement::{AccessQuery, ConsumeScope, EntitlementPolicy};
pub use error::CoreError;
pub use stream::{StreamId, StreamRecord};
pub use tags::{TagMap, TagShift};
pub use types::{AccountId, CheckpointId, Digest};

/// Maximum length of a stream display name, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum length of a tag, in bytes.
pub const MAX_TAG_LEN: usize = 128;

/// Maximum length of a ciphertext storage pointer, in bytes.
pub const MAX_POINTER_LEN: usize = 2048;
