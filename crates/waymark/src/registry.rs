//! The Registry: unified API for the Waymark system.
//!
//! The Registry brings together checkpoint chains, tags, entitlements, and
//! key-envelope delivery into a cohesive multi-stream interface.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use waymark_access::{ConsumptionScope, EnvelopeDraft, KeyEnvelope, TokenLedger};
use waymark_core::{
    AccessQuery, AccountId, Checkpoint, CheckpointDraft, CheckpointId, ConsumeScope,
    EntitlementPolicy, StreamId, StreamRecord, TagShift, MAX_NAME_LEN, MAX_POINTER_LEN,
    MAX_TAG_LEN,
};
use waymark_store::{AppendResult, InsertOutcome, Store, StoreError};

use crate::error::{RegistryError, Result};
use crate::events::Event;

/// Configuration for the Registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// Result of walking a stream's chain from head to the genesis sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// The head the walk started from, if any.
    pub head: Option<CheckpointId>,
    /// Number of checkpoints reached.
    pub length: u64,
    /// Whether every link resolved, every id re-derived, no id repeated,
    /// and the walk length matched the stored count.
    pub intact: bool,
    /// Description of the first defect found.
    pub defect: Option<String>,
}

/// The main Registry struct.
///
/// Provides a unified API for:
/// - Creating streams and transferring write authority
/// - Publishing checkpoints and updating their storage pointers
/// - Assigning and resolving tags
/// - Consuming under the stream's entitlement policy
/// - Delivering key envelopes to entitled consumers
///
/// Mutating calls are serialized through one internal command lock, so
/// every state transition observes the complete effect of the previous
/// one. Reads take no lock.
pub struct Registry<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// External token capability for counted and threshold modes.
    ledger: Arc<dyn TokenLedger>,
    /// Serializes mutating calls.
    commands: Mutex<()>,
    /// Event broadcast channel.
    events: broadcast::Sender<Event>,
}

impl<S: Store> Registry<S> {
    /// Create a new registry instance.
    pub fn new(store: S, ledger: Arc<dyn TokenLedger>, config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            store: Arc::new(store),
            ledger,
            commands: Mutex::new(()),
            events,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stream Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new stream with `creator` as its publisher.
    ///
    /// The stream id is derived from the creator and a persisted registry
    /// nonce, so repeated calls by the same creator yield distinct streams.
    pub async fn create_stream(
        &self,
        creator: &AccountId,
        name: &str,
        policy: EntitlementPolicy,
    ) -> Result<StreamId> {
        let _guard = self.commands.lock().await;

        if creator.is_zero() {
            return Err(RegistryError::InvalidArgument(
                "creator must be non-zero".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "stream name must be non-empty".to_string(),
            ));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RegistryError::InvalidArgument(format!(
                "stream name exceeds {} bytes",
                MAX_NAME_LEN
            )));
        }
        policy
            .validate()
            .map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;

        let nonce = self.store.stream_nonce().await?;
        let stream_id = StreamId::derive(creator, nonce);
        let record = StreamRecord::new(stream_id, *creator, name.to_string(), policy, now_millis());

        match self.store.insert_stream(&record, nonce + 1).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::Exists => {
                tracing::warn!(stream = %stream_id, nonce, "derived stream id already exists");
                return Err(RegistryError::StreamCollision(stream_id));
            }
        }

        tracing::debug!(stream = %stream_id, publisher = %creator, "stream created");
        self.emit(Event::StreamCreated {
            stream_id,
            publisher: *creator,
            name: name.to_string(),
            policy,
        });
        Ok(stream_id)
    }

    /// Transfer write authority to a new publisher.
    pub async fn transfer_publisher(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        new_publisher: &AccountId,
    ) -> Result<()> {
        let _guard = self.commands.lock().await;

        let record = self.require_publisher(stream_id, caller).await?;
        if new_publisher.is_zero() {
            return Err(RegistryError::InvalidArgument(
                "new publisher must be non-zero".to_string(),
            ));
        }

        self.store
            .update_publisher(stream_id, new_publisher, now_millis())
            .await?;

        tracing::debug!(stream = %stream_id, next = %new_publisher, "publisher transferred");
        self.emit(Event::PublisherTransferred {
            stream_id: *stream_id,
            previous: record.publisher,
            next: *new_publisher,
        });
        Ok(())
    }

    /// Get a stream's record.
    pub async fn stream(&self, stream_id: &StreamId) -> Result<Option<StreamRecord>> {
        Ok(self.store.get_stream(stream_id).await?)
    }

    /// List all streams in creation order.
    pub async fn list_streams(&self) -> Result<Vec<StreamId>> {
        Ok(self.store.list_streams().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoint Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Publish a checkpoint to a stream's chain.
    ///
    /// Links the new record to the current head, stamps it with the next
    /// registry-wide sequence marker, and optionally binds the draft's
    /// label as a tag, all in one atomic step.
    pub async fn publish(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        draft: CheckpointDraft,
    ) -> Result<CheckpointId> {
        let _guard = self.commands.lock().await;

        let record = self.require_publisher(stream_id, caller).await?;
        validate_pointer(&draft.ciphertext_pointer)?;
        if let Some(label) = &draft.label {
            validate_tag(label)?;
        }

        let sequence = self.store.publish_sequence().await? + 1;
        let checkpoint = Checkpoint::seal(
            *stream_id,
            record.count,
            record.head,
            &draft,
            now_millis(),
            sequence,
        );

        match self
            .store
            .append_checkpoint(&checkpoint, draft.label.as_deref())
            .await?
        {
            AppendResult::Appended { shift } => {
                tracing::debug!(
                    stream = %stream_id,
                    checkpoint = %checkpoint.id,
                    seq = checkpoint.seq,
                    "checkpoint published"
                );
                let id = checkpoint.id;
                self.emit(Event::CheckpointPublished {
                    stream_id: *stream_id,
                    checkpoint,
                    label: draft.label,
                    shift: shift.unwrap_or_default(),
                });
                Ok(id)
            }
            AppendResult::IdExists => {
                tracing::warn!(
                    stream = %stream_id,
                    checkpoint = %checkpoint.id,
                    "derived checkpoint id already exists"
                );
                Err(RegistryError::CheckpointCollision(checkpoint.id))
            }
        }
    }

    /// Rewrite a checkpoint's ciphertext pointer.
    ///
    /// The pointer is the only mutable field of a checkpoint; it is
    /// excluded from id derivation, so the identity is unchanged.
    pub async fn update_pointer(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        checkpoint: &CheckpointId,
        new_pointer: &str,
    ) -> Result<()> {
        let _guard = self.commands.lock().await;

        self.require_publisher(stream_id, caller).await?;
        validate_pointer(new_pointer)?;

        let old = self
            .store
            .update_pointer(stream_id, checkpoint, new_pointer)
            .await?
            .ok_or(RegistryError::CheckpointNotFound(*checkpoint))?;

        tracing::debug!(stream = %stream_id, checkpoint = %checkpoint, "pointer updated");
        self.emit(Event::PointerUpdated {
            stream_id: *stream_id,
            checkpoint_id: *checkpoint,
            old,
            new: new_pointer.to_string(),
        });
        Ok(())
    }

    /// Get the current head of a stream's chain, if any.
    pub async fn head(&self, stream_id: &StreamId) -> Result<Option<CheckpointId>> {
        Ok(self.require_stream(stream_id).await?.head)
    }

    /// Get the number of checkpoints in a stream's chain.
    pub async fn count(&self, stream_id: &StreamId) -> Result<u64> {
        Ok(self.require_stream(stream_id).await?.count)
    }

    /// Get a checkpoint by id.
    pub async fn checkpoint(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>> {
        self.require_stream(stream_id).await?;
        Ok(self.store.get_checkpoint(stream_id, id).await?)
    }

    /// Get a checkpoint by chain position (0-based).
    pub async fn checkpoint_at(&self, stream_id: &StreamId, index: u64) -> Result<Checkpoint> {
        let record = self.require_stream(stream_id).await?;
        if index >= record.count {
            return Err(RegistryError::OutOfRange {
                index,
                count: record.count,
            });
        }
        self.store
            .checkpoint_at(stream_id, index)
            .await?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("no checkpoint at index {}", index)).into()
            })
    }

    /// Audit a stream's chain.
    ///
    /// Walks predecessor links from the head to the genesis sentinel,
    /// re-deriving each id along the way, and checks the walk against the
    /// stored count.
    pub async fn verify_chain(&self, stream_id: &StreamId) -> Result<ChainReport> {
        let record = self.require_stream(stream_id).await?;

        let mut report = ChainReport {
            head: record.head,
            length: 0,
            intact: true,
            defect: None,
        };
        let mut seen = HashSet::new();
        let mut cursor = record.head;

        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Ok(report.broken(format!("checkpoint {} appears twice", id)));
            }
            let Some(checkpoint) = self.store.get_checkpoint(stream_id, &id).await? else {
                return Ok(report.broken(format!("dangling predecessor link to {}", id)));
            };
            if checkpoint.compute_id() != checkpoint.id {
                return Ok(report.broken(format!("checkpoint {} fails re-derivation", id)));
            }
            report.length += 1;
            cursor = checkpoint.prev;
        }

        if report.length != record.count {
            let defect = format!(
                "walked {} checkpoints, stream count is {}",
                report.length, record.count
            );
            return Ok(report.broken(defect));
        }
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tag Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind a tag to a checkpoint.
    ///
    /// Both sides of any prior pairing are cleared in the same step: the
    /// tag's old checkpoint loses it, and the checkpoint's old tag unbinds.
    /// The returned [`TagShift`] reports what was displaced.
    pub async fn assign_tag(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        checkpoint: &CheckpointId,
        tag: &str,
    ) -> Result<TagShift> {
        let _guard = self.commands.lock().await;

        self.require_publisher(stream_id, caller).await?;
        validate_tag(tag)?;

        let shift = self
            .store
            .assign_tag(stream_id, checkpoint, tag)
            .await?
            .ok_or(RegistryError::CheckpointNotFound(*checkpoint))?;

        tracing::debug!(stream = %stream_id, checkpoint = %checkpoint, tag, "tag assigned");
        self.emit(Event::TagAssigned {
            stream_id: *stream_id,
            checkpoint_id: *checkpoint,
            tag: tag.to_string(),
            shift: shift.clone(),
        });
        Ok(shift)
    }

    /// Resolve a tag to the checkpoint it currently names.
    pub async fn resolve_tag(
        &self,
        stream_id: &StreamId,
        tag: &str,
    ) -> Result<Option<CheckpointId>> {
        self.require_stream(stream_id).await?;
        Ok(self.store.resolve_tag(stream_id, tag).await?)
    }

    /// Get the tag a checkpoint currently carries.
    pub async fn tag_of(
        &self,
        stream_id: &StreamId,
        checkpoint: &CheckpointId,
    ) -> Result<Option<String>> {
        self.require_stream(stream_id).await?;
        Ok(self.store.tag_of(stream_id, checkpoint).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Consume under the stream's entitlement policy.
    ///
    /// Counted modes burn the configured cost and record the consumption
    /// exactly once per (account, scope); a repeat fails `AlreadyConsumed`
    /// before anything is burned. Threshold and allowlist modes record
    /// nothing and succeed trivially.
    pub async fn consume(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        checkpoint: &CheckpointId,
    ) -> Result<()> {
        let _guard = self.commands.lock().await;

        let record = self.require_stream(stream_id).await?;
        let EntitlementPolicy::Counted { cost, scope } = record.policy else {
            return Ok(());
        };

        let scope = match scope {
            ConsumeScope::PerCheckpoint => {
                if self.store.get_checkpoint(stream_id, checkpoint).await?.is_none() {
                    return Err(RegistryError::ScopeNotFound(*checkpoint));
                }
                ConsumptionScope::Checkpoint(*checkpoint)
            }
            ConsumeScope::Universal => ConsumptionScope::Stream,
        };

        let key = scope.storage_key();
        if self.store.has_consumed(stream_id, caller, &key).await? {
            return Err(RegistryError::AlreadyConsumed(*caller));
        }

        if cost > 0 {
            self.ledger.burn(stream_id, caller, cost).await.map_err(|e| {
                tracing::warn!(stream = %stream_id, account = %caller, error = %e, "burn failed");
                e
            })?;
        }
        self.store
            .record_consumption(stream_id, caller, &key, now_millis())
            .await?;

        tracing::debug!(stream = %stream_id, account = %caller, "consumption recorded");
        self.emit(Event::ConsumptionRecorded {
            stream_id: *stream_id,
            account: *caller,
            scope,
        });
        Ok(())
    }

    /// May this account receive delivery for this checkpoint?
    ///
    /// Counted modes reflect the recorded consumption flag; threshold mode
    /// re-reads the external balance on every call; allowlist mode admits
    /// the publisher, roster members, or everyone when open.
    pub async fn may_consume(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        checkpoint: &CheckpointId,
    ) -> Result<bool> {
        let record = self.require_stream(stream_id).await?;
        let query = self.gather_query(&record, account, checkpoint).await?;
        Ok(record.policy.grants(&query))
    }

    /// Add one account to the allowlist roster.
    pub async fn roster_add(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        account: &AccountId,
    ) -> Result<()> {
        self.roster_add_many(stream_id, caller, std::slice::from_ref(account))
            .await
            .map(|_| ())
    }

    /// Add a batch of accounts to the allowlist roster.
    ///
    /// Returns the number of accounts that were not already present.
    pub async fn roster_add_many(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        accounts: &[AccountId],
    ) -> Result<usize> {
        let _guard = self.commands.lock().await;

        let record = self.require_publisher(stream_id, caller).await?;
        self.require_roster(&record)?;
        if accounts.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "no accounts given".to_string(),
            ));
        }
        if accounts.iter().any(|a| a.is_zero()) {
            return Err(RegistryError::InvalidArgument(
                "roster account must be non-zero".to_string(),
            ));
        }

        let added = self.store.roster_add(stream_id, accounts, now_millis()).await?;

        tracing::debug!(stream = %stream_id, count = accounts.len(), added, "roster extended");
        self.emit(Event::RosterUpdated {
            stream_id: *stream_id,
            added: accounts.to_vec(),
            removed: Vec::new(),
        });
        Ok(added)
    }

    /// Remove an account from the allowlist roster.
    ///
    /// Returns whether the account was present.
    pub async fn roster_remove(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        account: &AccountId,
    ) -> Result<bool> {
        let _guard = self.commands.lock().await;

        let record = self.require_publisher(stream_id, caller).await?;
        self.require_roster(&record)?;

        let removed = self.store.roster_remove(stream_id, account).await?;

        tracing::debug!(stream = %stream_id, account = %account, removed, "roster shrunk");
        self.emit(Event::RosterUpdated {
            stream_id: *stream_id,
            added: Vec::new(),
            removed: vec![*account],
        });
        Ok(removed)
    }

    /// Is this account on the allowlist roster?
    pub async fn roster_contains(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
    ) -> Result<bool> {
        self.require_stream(stream_id).await?;
        Ok(self.store.roster_contains(stream_id, account).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Envelope Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Deliver a wrapped key to an entitled consumer, write-once per
    /// (consumer, checkpoint).
    pub async fn deliver(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
        consumer: &AccountId,
        checkpoint: &CheckpointId,
        draft: EnvelopeDraft,
    ) -> Result<()> {
        let _guard = self.commands.lock().await;

        let record = self.require_publisher(stream_id, caller).await?;
        if self.store.get_checkpoint(stream_id, checkpoint).await?.is_none() {
            return Err(RegistryError::CheckpointNotFound(*checkpoint));
        }
        draft
            .validate()
            .map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
        if self.store.has_envelope(stream_id, consumer, checkpoint).await? {
            return Err(RegistryError::AlreadyDelivered(*consumer));
        }
        let query = self.gather_query(&record, consumer, checkpoint).await?;
        if !record.policy.grants(&query) {
            return Err(RegistryError::NotEntitled(*consumer));
        }

        let envelope = KeyEnvelope::from_draft(draft, now_millis());
        self.store
            .insert_envelope(stream_id, consumer, checkpoint, &envelope)
            .await?;

        tracing::debug!(
            stream = %stream_id,
            consumer = %consumer,
            checkpoint = %checkpoint,
            "envelope delivered"
        );
        self.emit(Event::EnvelopeDelivered {
            stream_id: *stream_id,
            consumer: *consumer,
            checkpoint_id: *checkpoint,
        });
        Ok(())
    }

    /// Get the envelope delivered to a consumer for a checkpoint.
    pub async fn envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        checkpoint: &CheckpointId,
    ) -> Result<Option<KeyEnvelope>> {
        self.require_stream(stream_id).await?;
        Ok(self.store.get_envelope(stream_id, consumer, checkpoint).await?)
    }

    /// Has an envelope been delivered to this consumer for this checkpoint?
    pub async fn has_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        checkpoint: &CheckpointId,
    ) -> Result<bool> {
        self.require_stream(stream_id).await?;
        Ok(self.store.has_envelope(stream_id, consumer, checkpoint).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn require_stream(&self, stream_id: &StreamId) -> Result<StreamRecord> {
        self.store
            .get_stream(stream_id)
            .await?
            .ok_or(RegistryError::StreamNotFound(*stream_id))
    }

    async fn require_publisher(
        &self,
        stream_id: &StreamId,
        caller: &AccountId,
    ) -> Result<StreamRecord> {
        let record = self.require_stream(stream_id).await?;
        if record.publisher != *caller {
            return Err(RegistryError::NotAuthorized(*caller));
        }
        Ok(record)
    }

    fn require_roster(&self, record: &StreamRecord) -> Result<()> {
        if !record.policy.uses_roster() {
            return Err(RegistryError::InvalidOperation(
                "stream does not use a roster".to_string(),
            ));
        }
        Ok(())
    }

    /// Gather the facts the stream's policy consults for one account.
    async fn gather_query(
        &self,
        record: &StreamRecord,
        account: &AccountId,
        checkpoint: &CheckpointId,
    ) -> Result<AccessQuery> {
        let mut query = AccessQuery {
            is_publisher: record.publisher == *account,
            ..AccessQuery::default()
        };

        if let Some(scope) = ConsumptionScope::for_policy(&record.policy, *checkpoint) {
            query.consumed = self
                .store
                .has_consumed(&record.stream_id, account, &scope.storage_key())
                .await?;
        }
        if matches!(record.policy, EntitlementPolicy::Threshold { .. }) {
            query.balance = self.ledger.balance_of(&record.stream_id, account).await?;
        }
        if record.policy.uses_roster() && !query.is_publisher {
            query.on_roster = self
                .store
                .roster_contains(&record.stream_id, account)
                .await?;
        }
        Ok(query)
    }

    /// Send errors mean no receiver is subscribed; that is fine.
    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }
}

impl ChainReport {
    fn broken(mut self, defect: String) -> Self {
        self.intact = false;
        self.defect = Some(defect);
        self
    }
}

fn validate_pointer(pointer: &str) -> Result<()> {
    if pointer.is_empty() {
        return Err(RegistryError::InvalidArgument(
            "ciphertext pointer must be non-empty".to_string(),
        ));
    }
    if pointer.len() > MAX_POINTER_LEN {
        return Err(RegistryError::InvalidArgument(format!(
            "ciphertext pointer exceeds {} bytes",
            MAX_POINTER_LEN
        )));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(RegistryError::InvalidArgument(
            "tag must be non-empty".to_string(),
        ));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(RegistryError::InvalidArgument(format!(
            "tag exceeds {} bytes",
            MAX_TAG_LEN
        )));
    }
    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
