//! Entitlement policies: who may consume a checkpoint's key material.
//!
//! A policy is chosen once at stream creation and never changes. Three
//! variants share one query contract:
//!
//! - `Counted` - burn-to-consume; each (account, scope) consumes exactly
//!   once, where scope is a single checkpoint or the whole stream.
//! - `Threshold` - stateless holding check against an external balance.
//! - `Allowlist` - publisher-managed roster, optionally fully open.
//!
//! Evaluation itself is pure: the engine gathers the facts about an account
//! into an [`AccessQuery`] (consumption flag, roster membership, balance)
//! and the policy decides from those facts alone.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Scope granularity for counted consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumeScope {
    /// One consumption per (account, checkpoint).
    PerCheckpoint,

    /// One consumption per account for the whole stream; the checkpoint
    /// argument of a consume call is ignored.
    Universal,
}

/// The entitlement policy of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitlementPolicy {
    /// Burn-gated, exactly-once consumption. Zero cost is valid and means
    /// "free but still exactly-once".
    Counted { cost: u128, scope: ConsumeScope },

    /// Stateless minimum-holding check against the external balance
    /// capability. Nothing is recorded; eligibility is re-evaluated on
    /// every query.
    Threshold { minimum: u128 },

    /// Explicit roster managed by the publisher. When `open`, every
    /// account is eligible and the roster is not consulted.
    Allowlist { open: bool },
}

/// Facts about one account, gathered by the engine for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessQuery {
    /// The account is the stream's current publisher.
    pub is_publisher: bool,

    /// The account is on the stream's roster.
    pub on_roster: bool,

    /// A consumption record exists for the applicable scope.
    pub consumed: bool,

    /// The account's external token balance.
    pub balance: u128,
}

impl EntitlementPolicy {
    /// Reject configurations that cannot mean anything.
    ///
    /// A threshold of zero would grant every account unconditionally;
    /// streams wanting that semantics use an open allowlist instead.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            EntitlementPolicy::Threshold { minimum: 0 } => Err(CoreError::InvalidPolicy(
                "threshold minimum must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether this policy records consumption state.
    pub fn is_counted(&self) -> bool {
        matches!(self, EntitlementPolicy::Counted { .. })
    }

    /// Whether this policy uses the publisher-managed roster.
    pub fn uses_roster(&self) -> bool {
        matches!(self, EntitlementPolicy::Allowlist { open: false })
    }

    /// Decide eligibility from gathered facts.
    pub fn grants(&self, query: &AccessQuery) -> bool {
        match self {
            EntitlementPolicy::Counted { .. } => query.consumed,
            EntitlementPolicy::Threshold { minimum } => query.balance >= *minimum,
            EntitlementPolicy::Allowlist { open } => {
                *open || query.is_publisher || query.on_roster
            }
        }
    }

    /// Serialize to CBOR bytes for at-rest storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
