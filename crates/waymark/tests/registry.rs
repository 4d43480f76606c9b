//! End-to-end registry scenarios, run against both storage backends.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use waymark::access::{
    CapabilityError, EnvelopeDraft, EnvelopeNonce, EphemeralPublicKey, TokenLedger,
};
use waymark::store::{MemoryStore, SqliteStore, Store};
use waymark::{
    AccountId, CheckpointDraft, ConsumeScope, Digest, EntitlementPolicy, Event, Registry,
    RegistryConfig, RegistryError, StreamId,
};

/// Token ledger with settable balances and a burn journal.
#[derive(Default)]
struct StubLedger {
    balances: Mutex<HashMap<(StreamId, AccountId), u128>>,
    burns: Mutex<Vec<(StreamId, AccountId, u128)>>,
}

impl StubLedger {
    async fn set_balance(&self, stream: StreamId, account: AccountId, amount: u128) {
        self.balances.lock().await.insert((stream, account), amount);
    }

    async fn burned(&self) -> Vec<(StreamId, AccountId, u128)> {
        self.burns.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl TokenLedger for StubLedger {
    async fn burn(
        &self,
        stream: &StreamId,
        account: &AccountId,
        amount: u128,
    ) -> std::result::Result<(), CapabilityError> {
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
    ) -> std::result::Result<u128, CapabilityError> {
        Ok(self
            .balances
            .lock()
            .await
            .get(&(*stream, *account))
            .copied()
            .unwrap_or(0))
    }
}

fn registry_with<S: Store>(store: S) -> (Registry<S>, Arc<StubLedger>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let ledger = Arc::new(StubLedger::default());
    let registry = Registry::new(store, ledger.clone(), RegistryConfig::default());
    (registry, ledger)
}

fn memory() -> (Registry<MemoryStore>, Arc<StubLedger>) {
    registry_with(MemoryStore::new())
}

fn sqlite() -> Result<(Registry<SqliteStore>, Arc<StubLedger>)> {
    Ok(registry_with(SqliteStore::open_memory()?))
}

fn account(byte: u8) -> AccountId {
    AccountId::from_bytes([byte; 32])
}

fn draft(tag: &str) -> CheckpointDraft {
    CheckpointDraft::new(
        Digest::hash(format!("state-{}", tag).as_bytes()),
        Digest::hash(format!("cipher-{}", tag).as_bytes()),
        format!("ipfs://{}", tag),
        Digest::hash(format!("manifest-{}", tag).as_bytes()),
    )
}

fn envelope_draft() -> EnvelopeDraft {
    EnvelopeDraft::new(
        vec![0xEE; 48],
        EnvelopeNonce::from_bytes([7; 12]),
        EphemeralPublicKey::from_bytes([0x5e; 32]),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkpoint chain
// ─────────────────────────────────────────────────────────────────────────────

async fn chain_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let stream = registry
        .create_stream(&publisher, "records", EntitlementPolicy::Allowlist { open: true })
        .await?;

    assert_eq!(registry.head(&stream).await?, None);
    assert_eq!(registry.count(&stream).await?, 0);

    let a = registry.publish(&stream, &publisher, draft("a")).await?;
    let b = registry.publish(&stream, &publisher, draft("b")).await?;

    assert_eq!(registry.head(&stream).await?, Some(b));
    assert_eq!(registry.count(&stream).await?, 2);
    assert_eq!(registry.checkpoint_at(&stream, 0).await?.id, a);
    assert_eq!(registry.checkpoint_at(&stream, 1).await?.id, b);

    let first = registry.checkpoint(&stream, &a).await?.unwrap();
    let second = registry.checkpoint(&stream, &b).await?.unwrap();
    assert_eq!(first.prev, None);
    assert_eq!(second.prev, Some(a));
    assert!(first.is_genesis());
    assert!(second.sequence > first.sequence);

    let report = registry.verify_chain(&stream).await?;
    assert!(report.intact, "defect: {:?}", report.defect);
    assert_eq!(report.length, 2);
    assert_eq!(report.head, Some(b));

    let err = registry.checkpoint_at(&stream, 2).await.unwrap_err();
    assert!(matches!(err, RegistryError::OutOfRange { index: 2, count: 2 }));

    // Only the publisher may extend the chain.
    let err = registry
        .publish(&stream, &account(9), draft("rogue"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));

    Ok(())
}

#[tokio::test]
async fn chain_scenario_memory() -> Result<()> {
    chain_scenario(memory().0).await
}

#[tokio::test]
async fn chain_scenario_sqlite() -> Result<()> {
    chain_scenario(sqlite()?.0).await
}

async fn pointer_isolation_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let stream = registry
        .create_stream(&publisher, "records", EntitlementPolicy::Allowlist { open: true })
        .await?;
    let id = registry.publish(&stream, &publisher, draft("a")).await?;
    let before = registry.checkpoint(&stream, &id).await?.unwrap();

    registry
        .update_pointer(&stream, &publisher, &id, "ar://relocated")
        .await?;

    let after = registry.checkpoint(&stream, &id).await?.unwrap();
    assert_eq!(after.ciphertext_pointer, "ar://relocated");
    assert_eq!(after.id, before.id);
    assert_eq!(after.state_commitment, before.state_commitment);
    assert_eq!(after.ciphertext_hash, before.ciphertext_hash);
    assert_eq!(after.manifest_hash, before.manifest_hash);
    assert_eq!(after.timestamp, before.timestamp);
    assert_eq!(after.sequence, before.sequence);

    // The pointer is outside the identity preimage, so the audit still holds.
    assert!(registry.verify_chain(&stream).await?.intact);

    let err = registry
        .update_pointer(&stream, &publisher, &id, "")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    let err = registry
        .update_pointer(&stream, &account(9), &id, "ar://x")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));

    let ghost = waymark::CheckpointId::from_bytes([0xAB; 32]);
    let err = registry
        .update_pointer(&stream, &publisher, &ghost, "ar://x")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::CheckpointNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn pointer_isolation_memory() -> Result<()> {
    pointer_isolation_scenario(memory().0).await
}

#[tokio::test]
async fn pointer_isolation_sqlite() -> Result<()> {
    pointer_isolation_scenario(sqlite()?.0).await
}

async fn sequence_marker_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let first = registry
        .create_stream(&publisher, "first", EntitlementPolicy::Allowlist { open: true })
        .await?;
    let second = registry
        .create_stream(&publisher, "second", EntitlementPolicy::Allowlist { open: true })
        .await?;

    let a = registry.publish(&first, &publisher, draft("a")).await?;
    let b = registry.publish(&second, &publisher, draft("b")).await?;
    let c = registry.publish(&first, &publisher, draft("c")).await?;

    // One registry-wide marker: strictly increasing across streams.
    let seq_a = registry.checkpoint(&first, &a).await?.unwrap().sequence;
    let seq_b = registry.checkpoint(&second, &b).await?.unwrap().sequence;
    let seq_c = registry.checkpoint(&first, &c).await?.unwrap().sequence;
    assert_eq!((seq_a, seq_b, seq_c), (1, 2, 3));

    // Per-stream positions stay dense.
    assert_eq!(registry.checkpoint(&first, &c).await?.unwrap().seq, 1);
    assert_eq!(registry.checkpoint(&second, &b).await?.unwrap().seq, 0);

    Ok(())
}

#[tokio::test]
async fn sequence_marker_memory() -> Result<()> {
    sequence_marker_scenario(memory().0).await
}

#[tokio::test]
async fn sequence_marker_sqlite() -> Result<()> {
    sequence_marker_scenario(sqlite()?.0).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tags
// ─────────────────────────────────────────────────────────────────────────────

async fn tag_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let stream = registry
        .create_stream(&publisher, "records", EntitlementPolicy::Allowlist { open: true })
        .await?;
    let a = registry.publish(&stream, &publisher, draft("a")).await?;
    let b = registry.publish(&stream, &publisher, draft("b")).await?;

    let shift = registry.assign_tag(&stream, &publisher, &a, "v1").await?;
    assert!(shift.is_clean());
    assert_eq!(registry.resolve_tag(&stream, "v1").await?, Some(a));
    assert_eq!(registry.tag_of(&stream, &a).await?.as_deref(), Some("v1"));

    // Moving the tag strips it from the old checkpoint.
    let shift = registry.assign_tag(&stream, &publisher, &b, "v1").await?;
    assert_eq!(shift.untagged, Some(a));
    assert_eq!(registry.resolve_tag(&stream, "v1").await?, Some(b));
    assert_eq!(registry.tag_of(&stream, &a).await?, None);

    // Re-tagging the checkpoint unbinds its old name.
    let shift = registry.assign_tag(&stream, &publisher, &b, "stable").await?;
    assert_eq!(shift.unbound.as_deref(), Some("v1"));
    assert_eq!(registry.resolve_tag(&stream, "v1").await?, None);
    assert_eq!(registry.resolve_tag(&stream, "stable").await?, Some(b));

    let err = registry
        .assign_tag(&stream, &account(9), &a, "v2")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));

    let err = registry
        .assign_tag(&stream, &publisher, &a, "")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    let ghost = waymark::CheckpointId::from_bytes([0xAB; 32]);
    let err = registry
        .assign_tag(&stream, &publisher, &ghost, "v2")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::CheckpointNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn tag_scenario_memory() -> Result<()> {
    tag_scenario(memory().0).await
}

#[tokio::test]
async fn tag_scenario_sqlite() -> Result<()> {
    tag_scenario(sqlite()?.0).await
}

async fn publish_label_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let stream = registry
        .create_stream(&publisher, "records", EntitlementPolicy::Allowlist { open: true })
        .await?;

    let a = registry
        .publish(&stream, &publisher, draft("a").with_label("latest"))
        .await?;
    assert_eq!(registry.resolve_tag(&stream, "latest").await?, Some(a));

    // The label rides the publish transaction, displacing like assign_tag.
    let b = registry
        .publish(&stream, &publisher, draft("b").with_label("latest"))
        .await?;
    assert_eq!(registry.resolve_tag(&stream, "latest").await?, Some(b));
    assert_eq!(registry.tag_of(&stream, &a).await?, None);

    Ok(())
}

#[tokio::test]
async fn publish_label_memory() -> Result<()> {
    publish_label_scenario(memory().0).await
}

#[tokio::test]
async fn publish_label_sqlite() -> Result<()> {
    publish_label_scenario(sqlite()?.0).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Entitlements
// ─────────────────────────────────────────────────────────────────────────────

async fn universal_consume_scenario<S: Store>(
    registry: Registry<S>,
    ledger: Arc<StubLedger>,
) -> Result<()> {
    let publisher = account(1);
    let x = account(2);

    let universal = registry
        .create_stream(
            &publisher,
            "universal",
            EntitlementPolicy::Counted {
                cost: 5,
                scope: ConsumeScope::Universal,
            },
        )
        .await?;
    let per_checkpoint = registry
        .create_stream(
            &publisher,
            "per-checkpoint",
            EntitlementPolicy::Counted {
                cost: 5,
                scope: ConsumeScope::PerCheckpoint,
            },
        )
        .await?;

    let u1 = registry.publish(&universal, &publisher, draft("u1")).await?;
    let p1 = registry.publish(&per_checkpoint, &publisher, draft("p1")).await?;
    let p2 = registry.publish(&per_checkpoint, &publisher, draft("p2")).await?;

    ledger.set_balance(universal, x, 100).await;
    ledger.set_balance(per_checkpoint, x, 100).await;

    // Universal: once per account for the whole stream.
    registry.consume(&universal, &x, &u1).await?;
    let err = registry.consume(&universal, &x, &u1).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyConsumed(_)));

    // Per-checkpoint consumption on the other stream is independent.
    registry.consume(&per_checkpoint, &x, &p1).await?;
    assert!(registry.may_consume(&per_checkpoint, &x, &p1).await?);
    assert!(!registry.may_consume(&per_checkpoint, &x, &p2).await?);
    let err = registry.consume(&per_checkpoint, &x, &p1).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyConsumed(_)));

    // The universal flag still reads through any checkpoint argument.
    assert!(registry.may_consume(&universal, &x, &u1).await?);

    // Consuming a checkpoint that does not exist names a missing scope.
    let ghost = waymark::CheckpointId::from_bytes([0xAB; 32]);
    let err = registry.consume(&per_checkpoint, &x, &ghost).await.unwrap_err();
    assert!(matches!(err, RegistryError::ScopeNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn universal_consume_memory() -> Result<()> {
    let (registry, ledger) = memory();
    universal_consume_scenario(registry, ledger).await
}

#[tokio::test]
async fn universal_consume_sqlite() -> Result<()> {
    let (registry, ledger) = sqlite()?;
    universal_consume_scenario(registry, ledger).await
}

async fn burn_accounting_scenario<S: Store>(
    registry: Registry<S>,
    ledger: Arc<StubLedger>,
) -> Result<()> {
    let publisher = account(1);
    let x = account(2);

    let stream = registry
        .create_stream(
            &publisher,
            "paid",
            EntitlementPolicy::Counted {
                cost: 30,
                scope: ConsumeScope::PerCheckpoint,
            },
        )
        .await?;
    let cp = registry.publish(&stream, &publisher, draft("a")).await?;

    // Underfunded: the burn fails and nothing is recorded.
    ledger.set_balance(stream, x, 29).await;
    let err = registry.consume(&stream, &x, &cp).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Capability(CapabilityError::InsufficientBalance { .. })
    ));
    assert!(!registry.may_consume(&stream, &x, &cp).await?);
    assert!(ledger.burned().await.is_empty());

    // Funded: exactly one burn of exactly the cost.
    ledger.set_balance(stream, x, 100).await;
    registry.consume(&stream, &x, &cp).await?;
    assert_eq!(ledger.balance_of(&stream, &x).await?, 70);
    assert_eq!(ledger.burned().await, vec![(stream, x, 30)]);

    // The repeat fails before reaching the ledger.
    let err = registry.consume(&stream, &x, &cp).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyConsumed(_)));
    assert_eq!(ledger.balance_of(&stream, &x).await?, 70);
    assert_eq!(ledger.burned().await.len(), 1);

    Ok(())
}

#[tokio::test]
async fn burn_accounting_memory() -> Result<()> {
    let (registry, ledger) = memory();
    burn_accounting_scenario(registry, ledger).await
}

#[tokio::test]
async fn burn_accounting_sqlite() -> Result<()> {
    let (registry, ledger) = sqlite()?;
    burn_accounting_scenario(registry, ledger).await
}

async fn free_consume_scenario<S: Store>(
    registry: Registry<S>,
    ledger: Arc<StubLedger>,
) -> Result<()> {
    let publisher = account(1);
    let x = account(2);

    let stream = registry
        .create_stream(
            &publisher,
            "free",
            EntitlementPolicy::Counted {
                cost: 0,
                scope: ConsumeScope::PerCheckpoint,
            },
        )
        .await?;
    let cp = registry.publish(&stream, &publisher, draft("a")).await?;

    // Zero cost skips the ledger entirely but is still exactly-once.
    registry.consume(&stream, &x, &cp).await?;
    assert!(ledger.burned().await.is_empty());
    let err = registry.consume(&stream, &x, &cp).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyConsumed(_)));

    Ok(())
}

#[tokio::test]
async fn free_consume_memory() -> Result<()> {
    let (registry, ledger) = memory();
    free_consume_scenario(registry, ledger).await
}

#[tokio::test]
async fn free_consume_sqlite() -> Result<()> {
    let (registry, ledger) = sqlite()?;
    free_consume_scenario(registry, ledger).await
}

async fn threshold_scenario<S: Store>(
    registry: Registry<S>,
    ledger: Arc<StubLedger>,
) -> Result<()> {
    let publisher = account(1);
    let x = account(2);

    let stream = registry
        .create_stream(&publisher, "holders", EntitlementPolicy::Threshold { minimum: 50 })
        .await?;
    let cp = registry.publish(&stream, &publisher, draft("a")).await?;

    assert!(!registry.may_consume(&stream, &x, &cp).await?);
    ledger.set_balance(stream, x, 49).await;
    assert!(!registry.may_consume(&stream, &x, &cp).await?);
    ledger.set_balance(stream, x, 50).await;
    assert!(registry.may_consume(&stream, &x, &cp).await?);

    // Threshold consumption records nothing.
    registry.consume(&stream, &x, &cp).await?;
    registry.consume(&stream, &x, &cp).await?;
    assert!(ledger.burned().await.is_empty());

    // Eligibility tracks the balance, not history.
    ledger.set_balance(stream, x, 10).await;
    assert!(!registry.may_consume(&stream, &x, &cp).await?);

    Ok(())
}

#[tokio::test]
async fn threshold_memory() -> Result<()> {
    let (registry, ledger) = memory();
    threshold_scenario(registry, ledger).await
}

#[tokio::test]
async fn threshold_sqlite() -> Result<()> {
    let (registry, ledger) = sqlite()?;
    threshold_scenario(registry, ledger).await
}

async fn allowlist_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let publisher = account(1);
    let member = account(2);
    let stranger = account(3);

    let closed = registry
        .create_stream(&publisher, "closed", EntitlementPolicy::Allowlist { open: false })
        .await?;
    let cp = registry.publish(&closed, &publisher, draft("a")).await?;

    assert!(registry.may_consume(&closed, &publisher, &cp).await?);
    assert!(!registry.may_consume(&closed, &member, &cp).await?);

    registry.roster_add(&closed, &publisher, &member).await?;
    assert!(registry.roster_contains(&closed, &member).await?);
    assert!(registry.may_consume(&closed, &member, &cp).await?);
    assert!(!registry.may_consume(&closed, &stranger, &cp).await?);

    assert!(registry.roster_remove(&closed, &publisher, &member).await?);
    assert!(!registry.may_consume(&closed, &member, &cp).await?);

    // Batch add reports only new members.
    let added = registry
        .roster_add_many(&closed, &publisher, &[member, stranger])
        .await?;
    assert_eq!(added, 2);
    let added = registry
        .roster_add_many(&closed, &publisher, &[member, account(4)])
        .await?;
    assert_eq!(added, 1);

    let err = registry
        .roster_add_many(&closed, &publisher, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    let err = registry
        .roster_add(&closed, &publisher, &AccountId::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    let err = registry
        .roster_add(&closed, &member, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));

    // Open mode admits everyone without consulting the roster.
    let open = registry
        .create_stream(&publisher, "open", EntitlementPolicy::Allowlist { open: true })
        .await?;
    let cp_open = registry.publish(&open, &publisher, draft("b")).await?;
    assert!(registry.may_consume(&open, &stranger, &cp_open).await?);

    // Rosters only exist on closed allowlist streams.
    let counted = registry
        .create_stream(
            &publisher,
            "counted",
            EntitlementPolicy::Counted {
                cost: 1,
                scope: ConsumeScope::Universal,
            },
        )
        .await?;
    let err = registry
        .roster_add(&counted, &publisher, &member)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidOperation(_)));
    let err = registry
        .roster_add(&open, &publisher, &member)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidOperation(_)));

    Ok(())
}

#[tokio::test]
async fn allowlist_memory() -> Result<()> {
    allowlist_scenario(memory().0).await
}

#[tokio::test]
async fn allowlist_sqlite() -> Result<()> {
    allowlist_scenario(sqlite()?.0).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

async fn envelope_scenario<S: Store>(
    registry: Registry<S>,
    ledger: Arc<StubLedger>,
) -> Result<()> {
    let publisher = account(1);
    let consumer = account(2);

    let stream = registry
        .create_stream(
            &publisher,
            "paid",
            EntitlementPolicy::Counted {
                cost: 10,
                scope: ConsumeScope::PerCheckpoint,
            },
        )
        .await?;
    let cp = registry.publish(&stream, &publisher, draft("a")).await?;

    // Not yet consumed, so not yet entitled.
    let err = registry
        .deliver(&stream, &publisher, &consumer, &cp, envelope_draft())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotEntitled(_)));
    assert!(!registry.has_envelope(&stream, &consumer, &cp).await?);

    ledger.set_balance(stream, consumer, 10).await;
    registry.consume(&stream, &consumer, &cp).await?;

    registry
        .deliver(&stream, &publisher, &consumer, &cp, envelope_draft())
        .await?;

    // Stored verbatim.
    let envelope = registry.envelope(&stream, &consumer, &cp).await?.unwrap();
    assert_eq!(envelope.wrapped_key.as_ref(), &[0xEE; 48][..]);
    assert_eq!(envelope.nonce, EnvelopeNonce::from_bytes([7; 12]));
    assert_eq!(
        envelope.sender_public,
        EphemeralPublicKey::from_bytes([0x5e; 32])
    );

    // Write-once.
    let err = registry
        .deliver(&stream, &publisher, &consumer, &cp, envelope_draft())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyDelivered(_)));

    // Publisher-only.
    let err = registry
        .deliver(&stream, &consumer, &consumer, &cp, envelope_draft())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));

    // Checkpoint must exist before anything else is considered.
    let ghost = waymark::CheckpointId::from_bytes([0xAB; 32]);
    let err = registry
        .deliver(&stream, &publisher, &consumer, &ghost, envelope_draft())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::CheckpointNotFound(_)));

    // Draft bounds are enforced.
    let oversized = EnvelopeDraft::new(
        vec![0u8; 513],
        EnvelopeNonce::from_bytes([7; 12]),
        EphemeralPublicKey::from_bytes([0x5e; 32]),
    );
    let err = registry
        .deliver(&stream, &publisher, &account(4), &cp, oversized)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    let zero_sender = EnvelopeDraft::new(
        vec![1u8; 16],
        EnvelopeNonce::from_bytes([7; 12]),
        EphemeralPublicKey::from_bytes([0; 32]),
    );
    let err = registry
        .deliver(&stream, &publisher, &account(4), &cp, zero_sender)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    Ok(())
}

#[tokio::test]
async fn envelope_memory() -> Result<()> {
    let (registry, ledger) = memory();
    envelope_scenario(registry, ledger).await
}

#[tokio::test]
async fn envelope_sqlite() -> Result<()> {
    let (registry, ledger) = sqlite()?;
    envelope_scenario(registry, ledger).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream registry
// ─────────────────────────────────────────────────────────────────────────────

async fn stream_registry_scenario<S: Store>(registry: Registry<S>) -> Result<()> {
    let alice = account(1);
    let bob = account(2);

    let first = registry
        .create_stream(&alice, "first", EntitlementPolicy::Allowlist { open: true })
        .await?;
    let second = registry
        .create_stream(&alice, "second", EntitlementPolicy::Allowlist { open: true })
        .await?;
    assert_ne!(first, second);
    assert_eq!(registry.list_streams().await?, vec![first, second]);

    let record = registry.stream(&first).await?.unwrap();
    assert_eq!(record.publisher, alice);
    assert_eq!(record.name, "first");
    assert_eq!(record.policy, EntitlementPolicy::Allowlist { open: true });

    // Authority moves with the transfer.
    registry.transfer_publisher(&first, &alice, &bob).await?;
    let err = registry
        .publish(&first, &alice, draft("stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));
    registry.publish(&first, &bob, draft("fresh")).await?;

    let err = registry
        .transfer_publisher(&first, &alice, &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotAuthorized(_)));
    let err = registry
        .transfer_publisher(&first, &bob, &AccountId::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    // Argument validation at creation.
    let err = registry
        .create_stream(&AccountId::ZERO, "x", EntitlementPolicy::Allowlist { open: true })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    let err = registry
        .create_stream(&alice, "", EntitlementPolicy::Allowlist { open: true })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    let err = registry
        .create_stream(&alice, "zero", EntitlementPolicy::Threshold { minimum: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    // Unknown streams fail uniformly.
    let ghost = StreamId::from_bytes([0xCD; 32]);
    let err = registry.head(&ghost).await.unwrap_err();
    assert!(matches!(err, RegistryError::StreamNotFound(_)));
    let err = registry.publish(&ghost, &alice, draft("x")).await.unwrap_err();
    assert!(matches!(err, RegistryError::StreamNotFound(_)));
    assert_eq!(registry.stream(&ghost).await?, None);

    Ok(())
}

#[tokio::test]
async fn stream_registry_memory() -> Result<()> {
    stream_registry_scenario(memory().0).await
}

#[tokio::test]
async fn stream_registry_sqlite() -> Result<()> {
    stream_registry_scenario(sqlite()?.0).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_trace_every_mutation() -> Result<()> {
    let (registry, _ledger) = memory();
    let mut rx = registry.subscribe();

    let publisher = account(1);
    let consumer = account(2);

    let stream = registry
        .create_stream(
            &publisher,
            "observed",
            EntitlementPolicy::Counted {
                cost: 0,
                scope: ConsumeScope::PerCheckpoint,
            },
        )
        .await?;
    let cp = registry
        .publish(&stream, &publisher, draft("a").with_label("latest"))
        .await?;
    registry
        .update_pointer(&stream, &publisher, &cp, "ar://moved")
        .await?;
    registry.consume(&stream, &consumer, &cp).await?;
    registry
        .deliver(&stream, &publisher, &consumer, &cp, envelope_draft())
        .await?;
    registry.transfer_publisher(&stream, &publisher, &consumer).await?;

    match rx.try_recv()? {
        Event::StreamCreated {
            stream_id,
            publisher: creator,
            name,
            ..
        } => {
            assert_eq!(stream_id, stream);
            assert_eq!(creator, publisher);
            assert_eq!(name, "observed");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv()? {
        Event::CheckpointPublished {
            checkpoint, label, ..
        } => {
            assert_eq!(checkpoint.id, cp);
            assert_eq!(label.as_deref(), Some("latest"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv()? {
        Event::PointerUpdated { old, new, .. } => {
            assert_eq!(old, "ipfs://a");
            assert_eq!(new, "ar://moved");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv()? {
        Event::ConsumptionRecorded { account, .. } => assert_eq!(account, consumer),
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv()? {
        Event::EnvelopeDelivered {
            consumer: addressee,
            checkpoint_id,
            ..
        } => {
            assert_eq!(addressee, consumer);
            assert_eq!(checkpoint_id, cp);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv()? {
        Event::PublisherTransferred { previous, next, .. } => {
            assert_eq!(previous, publisher);
            assert_eq!(next, consumer);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_survives_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("registry.db");

    let publisher = account(1);
    let consumer = account(2);
    let (stream, cp);
    {
        let (registry, _ledger) = registry_with(SqliteStore::open(&path)?);
        stream = registry
            .create_stream(
                &publisher,
                "durable",
                EntitlementPolicy::Counted {
                    cost: 0,
                    scope: ConsumeScope::PerCheckpoint,
                },
            )
            .await?;
        cp = registry
            .publish(&stream, &publisher, draft("a").with_label("latest"))
            .await?;
        registry.consume(&stream, &consumer, &cp).await?;
        registry
            .deliver(&stream, &publisher, &consumer, &cp, envelope_draft())
            .await?;
    }

    let (registry, _ledger) = registry_with(SqliteStore::open(&path)?);
    assert_eq!(registry.head(&stream).await?, Some(cp));
    assert_eq!(registry.count(&stream).await?, 1);
    assert_eq!(registry.resolve_tag(&stream, "latest").await?, Some(cp));
    assert!(registry.may_consume(&stream, &consumer, &cp).await?);
    assert!(registry.has_envelope(&stream, &consumer, &cp).await?);
    assert!(registry.verify_chain(&stream).await?.intact);

    // The persisted sequence marker keeps advancing, not restarting.
    let next = registry.publish(&stream, &publisher, draft("b")).await?;
    let sequence = registry.checkpoint(&stream, &next).await?.unwrap().sequence;
    assert_eq!(sequence, 2);

    Ok(())
}
