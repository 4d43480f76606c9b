//! In-memory implementation of the Store trait.
//!
//! Backs tests and the store conformance suite. All state lives in a few
//! maps behind one RwLock; every mutation holds the write lock for its
//! whole body, which is what makes the coarse store methods atomic.
//!
//! All data is lost when the store is dropped.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use waymark_access::KeyEnvelope;
use waymark_core::{AccountId, Checkpoint, CheckpointId, StreamId, StreamRecord, TagMap, TagShift};

use crate::error::{Result, StoreError};
use crate::traits::{AppendResult, InsertOutcome, Store};

/// Per-stream storage: the chain index plus entitlement state.
#[derive(Debug, Default)]
struct StreamBucket {
    /// Checkpoint ids in append order; position equals `Checkpoint::seq`.
    order: Vec<CheckpointId>,

    /// Tag pairings, both directions.
    tags: TagMap,

    /// Allowlist roster.
    roster: HashSet<AccountId>,

    /// Consumption state: (account, scope key) -> consumed_at.
    consumed: HashMap<(AccountId, CheckpointId), i64>,

    /// Delivered envelopes keyed by (consumer, checkpoint).
    envelopes: HashMap<(AccountId, CheckpointId), KeyEnvelope>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Stream records in creation order alongside the keyed map, so
    /// enumeration stays deterministic.
    created: Vec<StreamId>,
    streams: HashMap<StreamId, StreamRecord>,
    buckets: HashMap<StreamId, StreamBucket>,

    /// Every checkpoint in the registry, keyed by id. Global on purpose:
    /// the append-time collision check spans streams.
    checkpoints: HashMap<CheckpointId, Checkpoint>,

    stream_nonce: u64,
    publish_sequence: u64,
}

/// In-memory store for testing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_stream(
        &self,
        record: &StreamRecord,
        next_nonce: u64,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();

        if inner.streams.contains_key(&record.stream_id) {
            return Ok(InsertOutcome::Exists);
        }

        inner.created.push(record.stream_id);
        inner.streams.insert(record.stream_id, record.clone());
        inner
            .buckets
            .insert(record.stream_id, StreamBucket::default());
        inner.stream_nonce = next_nonce;
        Ok(InsertOutcome::Inserted)
    }

    async fn update_publisher(
        &self,
        stream_id: &StreamId,
        new_publisher: &AccountId,
        at: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();

        let record = inner
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| StoreError::NotFound(format!("stream {}", stream_id)))?;
        record.publisher = *new_publisher;
        record.updated_at = at;
        Ok(())
    }

    async fn get_stream(&self, stream_id: &StreamId) -> Result<Option<StreamRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.streams.get(stream_id).cloned())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.created.clone())
    }

    async fn append_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        label: Option<&str>,
    ) -> Result<AppendResult> {
        let mut inner = self.inner.write().unwrap();

        if inner.checkpoints.contains_key(&checkpoint.id) {
            return Ok(AppendResult::IdExists);
        }

        inner.checkpoints.insert(checkpoint.id, checkpoint.clone());
        if let Some(record) = inner.streams.get_mut(&checkpoint.stream_id) {
            record.record_checkpoint(checkpoint.id, checkpoint.timestamp);
        }

        let bucket = inner.buckets.entry(checkpoint.stream_id).or_default();
        bucket.order.push(checkpoint.id);
        let shift = label.map(|tag| bucket.tags.assign(checkpoint.id, tag));

        inner.publish_sequence = checkpoint.sequence;
        Ok(AppendResult::Appended { shift })
    }

    async fn update_pointer(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        pointer: &str,
    ) -> Result<Option<String>> {
        let mut inner = self.inner.write().unwrap();

        match inner.checkpoints.get_mut(id) {
            Some(cp) if cp.stream_id == *stream_id => {
                let old = std::mem::replace(&mut cp.ciphertext_pointer, pointer.to_string());
                Ok(Some(old))
            }
            _ => Ok(None),
        }
    }

    async fn get_checkpoint(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .checkpoints
            .get(id)
            .filter(|cp| cp.stream_id == *stream_id)
            .cloned())
    }

    async fn checkpoint_at(
        &self,
        stream_id: &StreamId,
        index: u64,
    ) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().unwrap();
        let Some(bucket) = inner.buckets.get(stream_id) else {
            return Ok(None);
        };
        Ok(bucket
            .order
            .get(index as usize)
            .and_then(|id| inner.checkpoints.get(id))
            .cloned())
    }

    async fn assign_tag(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        tag: &str,
    ) -> Result<Option<TagShift>> {
        let mut inner = self.inner.write().unwrap();

        let belongs = inner
            .checkpoints
            .get(id)
            .map_or(false, |cp| cp.stream_id == *stream_id);
        if !belongs {
            return Ok(None);
        }

        let bucket = inner.buckets.entry(*stream_id).or_default();
        Ok(Some(bucket.tags.assign(*id, tag)))
    }

    async fn resolve_tag(&self, stream_id: &StreamId, tag: &str) -> Result<Option<CheckpointId>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .and_then(|bucket| bucket.tags.resolve(tag)))
    }

    async fn tag_of(&self, stream_id: &StreamId, id: &CheckpointId) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .and_then(|bucket| bucket.tags.tag_of(id).map(str::to_string)))
    }

    async fn record_consumption(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
        at: i64,
    ) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();

        let bucket = inner.buckets.entry(*stream_id).or_default();
        match bucket.consumed.entry((*account, *scope)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(at);
                Ok(true)
            }
        }
    }

    async fn has_consumed(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
    ) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .map_or(false, |bucket| {
                bucket.consumed.contains_key(&(*account, *scope))
            }))
    }

    async fn roster_add(
        &self,
        stream_id: &StreamId,
        accounts: &[AccountId],
        _at: i64,
    ) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();

        let bucket = inner.buckets.entry(*stream_id).or_default();
        let mut added = 0;
        for account in accounts {
            if bucket.roster.insert(*account) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn roster_remove(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner
            .buckets
            .get_mut(stream_id)
            .map_or(false, |bucket| bucket.roster.remove(account)))
    }

    async fn roster_contains(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .map_or(false, |bucket| bucket.roster.contains(account)))
    }

    async fn insert_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
        envelope: &KeyEnvelope,
    ) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();

        let bucket = inner.buckets.entry(*stream_id).or_default();
        match bucket.envelopes.entry((*consumer, *id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(envelope.clone());
                Ok(true)
            }
        }
    }

    async fn get_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<Option<KeyEnvelope>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .and_then(|bucket| bucket.envelopes.get(&(*consumer, *id)))
            .cloned())
    }

    async fn has_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .buckets
            .get(stream_id)
            .map_or(false, |bucket| {
                bucket.envelopes.contains_key(&(*consumer, *id))
            }))
    }

    async fn stream_nonce(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.stream_nonce)
    }

    async fn publish_sequence(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.publish_sequence)
    }
}
