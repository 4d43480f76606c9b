//! External token capabilities consumed by counted and threshold policies.
//!
//! The ledger never implements balance or transfer mechanics. Counted
//! streams call [`TokenLedger::burn`] once per successful consumption;
//! threshold streams call [`TokenLedger::balance_of`] on every eligibility
//! check. Everything else about the token is the host's business.

use async_trait::async_trait;

use waymark_core::{AccountId, StreamId};

use crate::error::CapabilityError;

/// The token side of entitlement, implemented by the host.
///
/// One implementation serves every stream in a registry; the `stream`
/// parameter lets it route each stream to its own token. Implementations
/// must be safe to call concurrently.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Destroy `amount` tokens held by `account`.
    ///
    /// Must fail (and change nothing) when the balance is insufficient.
    /// Called only by counted streams, and never with a zero amount.
    async fn burn(
        &self,
        stream: &StreamId,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), CapabilityError>;

    /// Current balance of `account` for the stream's token.
    ///
    /// Called only by threshold streams.
    async fn balance_of(
        &self,
        stream: &StreamId,
        account: &AccountId,
    ) -> Result<u128, CapabilityError>;
}

/// A token capability for registries that host no token-gated streams.
///
/// Every burn fails and every balance reads as zero, so counted and
/// threshold streams backed by this ledger reject all consumption while
/// allowlist streams work normally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTokenLedger;

#[async_trait]
impl TokenLedger for NullTokenLedger {
    async fn burn(
        &self,
        _stream: &StreamId,
        _account: &AccountId,
        _amount: u128,
    ) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable(
            "no token ledger configured".to_string(),
        ))
    }

    async fn balance_of(
        &self,
        _stream: &StreamId,
        _account: &AccountId,
    ) -> Result<u128, CapabilityError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_ledger_rejects_burns() {
        let ledger = NullTokenLedger;
        let stream = StreamId::from_bytes([1; 32]);
        let account = AccountId::from_bytes([2; 32]);

        let err = ledger.burn(&stream, &account, 1).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Unavailable(_)));

        assert_eq!(ledger.balance_of(&stream, &account).await.unwrap(), 0);
    }
}
