//! Error types for the Registry.

use thiserror::Error;

use waymark_access::CapabilityError;
use waymark_core::{AccountId, CheckpointId, StreamId};
use waymark_store::StoreError;

/// Errors that can occur during Registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Caller lacks publisher authority for the call.
    #[error("not authorized: {0}")]
    NotAuthorized(AccountId),

    /// Stream not found.
    #[error("stream not found: {0}")]
    StreamNotFound(StreamId),

    /// Checkpoint not found in the stream.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(CheckpointId),

    /// Consumption scope refers to a checkpoint that does not exist.
    #[error("consumption scope not found: {0}")]
    ScopeNotFound(CheckpointId),

    /// Empty, zero, or oversized input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The call does not apply to this stream's entitlement mode.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The account already consumed this scope.
    #[error("already consumed by {0}")]
    AlreadyConsumed(AccountId),

    /// An envelope already exists for this (consumer, checkpoint) pair.
    #[error("envelope already delivered to {0}")]
    AlreadyDelivered(AccountId),

    /// The entitlement policy does not grant the account access.
    #[error("not entitled: {0}")]
    NotEntitled(AccountId),

    /// A derived checkpoint id already exists somewhere in the registry.
    /// Signals a derivation-input problem, not a normal outcome.
    #[error("checkpoint id collision: {0}")]
    CheckpointCollision(CheckpointId),

    /// A derived stream id already exists.
    #[error("stream id collision: {0}")]
    StreamCollision(StreamId),

    /// Index accessor beyond the current chain length.
    #[error("index {index} out of range for chain of {count}")]
    OutOfRange { index: u64, count: u64 },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Token capability error.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),
}

/// Result type for Registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
