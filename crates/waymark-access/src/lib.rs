//! # Waymark Access
//!
//! Entitlement capabilities and key-envelope types for the Waymark ledger.
//!
//! ## Model
//!
//! Key material never touches the ledger in the clear. Publishers wrap a
//! decryption key per consumer under an external hybrid scheme and deliver
//! the resulting envelope through the registry, which gates acceptance on
//! the stream's entitlement policy and stores the envelope write-once.
//!
//! The token side of entitlement lives behind [`TokenLedger`]: counted
//! streams burn through it, threshold streams read balances through it,
//! and the ledger itself never mints, transfers, or holds anything.
//!
//! ## Key Types
//!
//! - [`TokenLedger`] - The burn/balance capability implemented by the host
//! - [`KeyEnvelope`] - One stored wrapped-key record
//! - [`ConsumptionScope`] - What a counted consumption applies to

pub mod capability;
pub mod consumption;
pub mod envelope;
pub mod error;

pub use capability::{NullTokenLedger, TokenLedger};
pub use consumption::{ConsumptionRecord, ConsumptionScope};
pub use envelope::{
    EnvelopeDraft, EnvelopeNonce, EphemeralPublicKey, KeyEnvelope, MAX_WRAPPED_KEY_LEN,
};
pub use error::{AccessError, CapabilityError};
