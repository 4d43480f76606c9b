//! Error types for entitlement capabilities and envelopes.

use thiserror::Error;

use waymark_core::AccountId;

/// Failures surfaced by the external token capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The account cannot cover the burn amount.
    #[error("insufficient balance for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        needed: u128,
        available: u128,
    },

    /// The capability is not configured or not reachable.
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The capability refused the call for its own reasons.
    #[error("capability rejected the call: {0}")]
    Rejected(String),
}

/// Validation failures for envelope drafts.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("wrapped key is empty")]
    EmptyWrappedKey,

    #[error("wrapped key is {len} bytes, maximum is {max}")]
    WrappedKeyTooLarge { len: usize, max: usize },

    #[error("sender public key is zero")]
    ZeroSenderKey,
}
