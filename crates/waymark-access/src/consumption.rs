//! Consumption scopes and records for counted entitlement.

use serde::{Deserialize, Serialize};

use waymark_core::{AccountId, CheckpointId, ConsumeScope, EntitlementPolicy};

/// What a consumption applies to.
///
/// Per-checkpoint counted streams record one consumption per (account,
/// checkpoint); universal counted streams record one per account for the
/// whole stream. Threshold and allowlist streams record nothing, so no
/// scope exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumptionScope {
    /// One specific checkpoint.
    Checkpoint(CheckpointId),

    /// The whole stream.
    Stream,
}

impl ConsumptionScope {
    /// The scope a policy assigns to a consume call against `checkpoint`,
    /// or `None` for stateless policies.
    pub fn for_policy(policy: &EntitlementPolicy, checkpoint: CheckpointId) -> Option<Self> {
        match policy {
            EntitlementPolicy::Counted {
                scope: ConsumeScope::PerCheckpoint,
                ..
            } => Some(ConsumptionScope::Checkpoint(checkpoint)),
            EntitlementPolicy::Counted {
                scope: ConsumeScope::Universal,
                ..
            } => Some(ConsumptionScope::Stream),
            EntitlementPolicy::Threshold { .. } | EntitlementPolicy::Allowlist { .. } => None,
        }
    }

    /// The at-rest key for this scope.
    ///
    /// Stream-wide consumption is keyed under the zero checkpoint id, which
    /// can never collide with a real checkpoint (real ids are Blake3
    /// outputs over a domain-prefixed preimage).
    pub fn storage_key(&self) -> CheckpointId {
        match self {
            ConsumptionScope::Checkpoint(id) => *id,
            ConsumptionScope::Stream => CheckpointId::ZERO,
        }
    }
}

/// One recorded consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Who consumed.
    pub account: AccountId,

    /// What they consumed.
    pub scope: ConsumptionScope,

    /// When (unix ms).
    pub consumed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for_counted_per_checkpoint() {
        let policy = EntitlementPolicy::Counted {
            cost: 1,
            scope: ConsumeScope::PerCheckpoint,
        };
        let cp = CheckpointId::from_bytes([4; 32]);
        assert_eq!(
            ConsumptionScope::for_policy(&policy, cp),
            Some(ConsumptionScope::Checkpoint(cp))
        );
    }

    #[test]
    fn test_scope_for_counted_universal_ignores_checkpoint() {
        let policy = EntitlementPolicy::Counted {
            cost: 1,
            scope: ConsumeScope::Universal,
        };
        let a = ConsumptionScope::for_policy(&policy, CheckpointId::from_bytes([4; 32]));
        let b = ConsumptionScope::for_policy(&policy, CheckpointId::from_bytes([9; 32]));
        assert_eq!(a, Some(ConsumptionScope::Stream));
        assert_eq!(a, b);
    }

    #[test]
    fn test_stateless_policies_have_no_scope() {
        let cp = CheckpointId::from_bytes([4; 32]);
        assert_eq!(
            ConsumptionScope::for_policy(&EntitlementPolicy::Threshold { minimum: 10 }, cp),
            None
        );
        assert_eq!(
            ConsumptionScope::for_policy(&EntitlementPolicy::Allowlist { open: false }, cp),
            None
        );
    }

    #[test]
    fn test_storage_keys_distinct() {
        let cp = CheckpointId::from_bytes([4; 32]);
        assert_eq!(ConsumptionScope::Checkpoint(cp).storage_key(), cp);
        assert_eq!(ConsumptionScope::Stream.storage_key(), CheckpointId::ZERO);
    }
}
