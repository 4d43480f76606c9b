//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an in-memory registry wired to
//! a stub token ledger, plus deterministic accounts and drafts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use waymark::{Registry, RegistryConfig};
use waymark_access::{
    CapabilityError, EnvelopeDraft, EnvelopeNonce, EphemeralPublicKey, TokenLedger,
};
use waymark_core::{AccountId, CheckpointDraft, CheckpointId, Digest, EntitlementPolicy, StreamId};
use waymark_store::MemoryStore;

/// Token ledger with settable balances and a burn journal.
///
/// Counted streams burn against the balances; threshold streams read them.
/// Every successful burn is journaled in order, so tests can assert on
/// exactly what was spent.
#[derive(Default)]
pub struct LedgerStub {
    balances: Mutex<HashMap<(StreamId, AccountId), u128>>,
    burns: Mutex<Vec<(StreamId, AccountId, u128)>>,
}

impl LedgerStub {
    /// Create a stub with no balances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the balance one account holds for one stream's token.
    pub async fn set_balance(&self, stream: StreamId, account: AccountId, amount: u128) {
        self.balances.lock().await.insert((stream, account), amount);
    }

    /// Every burn performed so far, in call order.
    pub async fn burned(&self) -> Vec<(StreamId, AccountId, u128)> {
        self.burns.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl TokenLedger for LedgerStub {
    async fn burn(
        &self,
        stream: &StreamId,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), CapabilityError> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry((*stream, *account)).or_insert(0);
        if *balance < amount {
            return Err(CapabilityError::InsufficientBalance {
                account: *account,
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        self.burns.lock().await.push((*stream, *account, amount));
        Ok(())
    }

    async fn balance_of(
        &self,
        stream: &StreamId,
        account: &AccountId,
    ) -> Result<u128, CapabilityError> {
        Ok(self
            .balances
            .lock()
            .await
            .get(&(*stream, *account))
            .copied()
            .unwrap_or(0))
    }
}

/// A test fixture with an in-memory registry, stub ledger, and publisher.
pub struct TestFixture {
    pub registry: Registry<MemoryStore>,
    pub ledger: Arc<LedgerStub>,
    pub publisher: AccountId,
}

impl TestFixture {
    /// Create a new test fixture with a random publisher account.
    pub fn new() -> Self {
        Self::with_publisher(rand::random())
    }

    /// Create with a deterministic publisher account.
    pub fn with_publisher(seed: [u8; 32]) -> Self {
        let ledger = Arc::new(LedgerStub::new());
        let registry = Registry::new(
            MemoryStore::new(),
            ledger.clone(),
            RegistryConfig::default(),
        );
        Self {
            registry,
            ledger,
            publisher: AccountId::from_bytes(seed),
        }
    }

    /// Create a stream owned by the fixture publisher.
    pub async fn create_stream(
        &self,
        name: &str,
        policy: EntitlementPolicy,
    ) -> waymark::Result<StreamId> {
        self.registry
            .create_stream(&self.publisher, name, policy)
            .await
    }

    /// Publish one checkpoint with commitments derived from `tag`.
    pub async fn publish(&self, stream: &StreamId, tag: &str) -> waymark::Result<CheckpointId> {
        self.registry
            .publish(stream, &self.publisher, draft(tag))
            .await
    }

    /// Publish `count` checkpoints, returning their ids in chain order.
    pub async fn publish_chain(
        &self,
        stream: &StreamId,
        count: usize,
    ) -> waymark::Result<Vec<CheckpointId>> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            ids.push(self.publish(stream, &format!("chain-{}", i)).await?);
        }
        Ok(ids)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A deterministic account filled with one byte.
pub fn account(byte: u8) -> AccountId {
    AccountId::from_bytes([byte; 32])
}

/// A fresh random account.
pub fn random_account() -> AccountId {
    AccountId::from_bytes(rand::random())
}

/// Distinct deterministic accounts for multi-party tests.
///
/// Accounts are numbered from one; the zero account is never produced.
pub fn accounts(count: usize) -> Vec<AccountId> {
    (1..=count).map(|i| account(i as u8)).collect()
}

/// A deterministic checkpoint draft whose commitments are derived from `tag`.
pub fn draft(tag: &str) -> CheckpointDraft {
    CheckpointDraft::new(
        Digest::hash(format!("state-{}", tag).as_bytes()),
        Digest::hash(format!("cipher-{}", tag).as_bytes()),
        format!("ipfs://{}", tag),
        Digest::hash(format!("manifest-{}", tag).as_bytes()),
    )
}

/// A valid envelope draft with a 48-byte wrapped key.
pub fn envelope_draft() -> EnvelopeDraft {
    EnvelopeDraft::new(
        vec![0xEE; 48],
        EnvelopeNonce::from_bytes([7; 12]),
        EphemeralPublicKey::from_bytes([0x5e; 32]),
    )
}
