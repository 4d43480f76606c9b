//! Store trait: the abstract interface for ledger persistence.
//!
//! This trait keeps the registry engine storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).
//!
//! Mutations are deliberately coarse. Every mutating registry call maps to
//! exactly one store method, and each method commits all of its writes
//! atomically or not at all: a transaction in SQLite, a single write-lock
//! section in memory. The engine serializes mutating calls, so
//! implementations never see two mutations in flight at once.

use async_trait::async_trait;

use waymark_access::KeyEnvelope;
use waymark_core::{AccountId, Checkpoint, CheckpointId, StreamId, StreamRecord, TagShift};

use crate::error::Result;

/// Result of inserting a stream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The stream was inserted.
    Inserted,
    /// A stream with this id already exists. Signals derivation-nonce
    /// reuse; the engine surfaces it as a collision.
    Exists,
}

/// Result of appending a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// The checkpoint was appended and the stream head advanced.
    Appended {
        /// What the label assignment displaced, when the append carried a
        /// label. `None` when no label was given.
        shift: Option<TagShift>,
    },
    /// A checkpoint with this id already exists somewhere in the registry.
    /// Nothing was written.
    IdExists,
}

/// The Store trait: async interface for registry persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Checkpoint ids are registry-global**: the existence check in
///   [`Store::append_checkpoint`] spans every stream, so a cross-stream id
///   collision is caught the same way a same-stream replay is.
/// - **Consumption scope keys**: consumption rows are keyed by a
///   `CheckpointId` that is either a real checkpoint id (per-checkpoint
///   scope) or the zero sentinel (stream-wide scope). Real ids are hash
///   outputs and can never equal the sentinel.
/// - **Write-once rows**: [`Store::record_consumption`] and
///   [`Store::insert_envelope`] report whether the row was new; they never
///   overwrite.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Stream Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a freshly created stream and advance the derivation nonce.
    ///
    /// `next_nonce` is the value the registry's stream nonce takes after
    /// this creation; it is persisted in the same transaction as the
    /// record, so a failed insert leaves the nonce untouched.
    ///
    /// Returns `Exists` (and writes nothing) if the id is already taken.
    async fn insert_stream(
        &self,
        record: &StreamRecord,
        next_nonce: u64,
    ) -> Result<InsertOutcome>;

    /// Replace a stream's publisher.
    ///
    /// Fails with [`StoreError::NotFound`] if the stream does not exist.
    ///
    /// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
    async fn update_publisher(
        &self,
        stream_id: &StreamId,
        new_publisher: &AccountId,
        at: i64,
    ) -> Result<()>;

    /// Get a stream record by id.
    async fn get_stream(&self, stream_id: &StreamId) -> Result<Option<StreamRecord>>;

    /// List every stream in the registry, in creation order.
    async fn list_streams(&self) -> Result<Vec<StreamId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoint Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a sealed checkpoint to its stream.
    ///
    /// One transaction covers the record insert, the stream's head/count
    /// advance (`updated_at` takes the checkpoint's timestamp), the
    /// publish-sequence bump, and the optional label assignment.
    ///
    /// Returns `IdExists` (and writes nothing) if the id is already
    /// present anywhere in the registry.
    async fn append_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        label: Option<&str>,
    ) -> Result<AppendResult>;

    /// Replace a checkpoint's ciphertext pointer.
    ///
    /// Returns the previous pointer, or `None` (writing nothing) when the
    /// checkpoint does not exist in this stream. No other field changes.
    async fn update_pointer(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        pointer: &str,
    ) -> Result<Option<String>>;

    /// Get a checkpoint by id, scoped to one stream.
    ///
    /// A checkpoint that exists under a different stream is `None` here.
    async fn get_checkpoint(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>>;

    /// Get a checkpoint by zero-based position within a stream.
    async fn checkpoint_at(&self, stream_id: &StreamId, index: u64)
        -> Result<Option<Checkpoint>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tag Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind a tag to a checkpoint, clearing both sides of any prior
    /// pairing in the same transaction.
    ///
    /// Returns `None` (writing nothing) when the checkpoint does not exist
    /// in this stream; otherwise the displaced pairings. Re-binding an
    /// existing pairing succeeds and displaces nothing.
    async fn assign_tag(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        tag: &str,
    ) -> Result<Option<TagShift>>;

    /// The checkpoint a tag names, if any.
    async fn resolve_tag(&self, stream_id: &StreamId, tag: &str) -> Result<Option<CheckpointId>>;

    /// The tag a checkpoint carries, if any.
    async fn tag_of(&self, stream_id: &StreamId, id: &CheckpointId) -> Result<Option<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a consumption for (account, scope key).
    ///
    /// Returns `true` if the row was new, `false` if the pair had already
    /// consumed. Existing rows are never touched.
    async fn record_consumption(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
        at: i64,
    ) -> Result<bool>;

    /// Whether a consumption row exists for (account, scope key).
    async fn has_consumed(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
    ) -> Result<bool>;

    /// Add accounts to a stream's roster in one transaction.
    ///
    /// Returns how many were newly added; accounts already present count
    /// for nothing and are left alone.
    async fn roster_add(
        &self,
        stream_id: &StreamId,
        accounts: &[AccountId],
        at: i64,
    ) -> Result<usize>;

    /// Remove an account from a stream's roster.
    ///
    /// Returns whether the account was present.
    async fn roster_remove(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool>;

    /// Whether an account is on a stream's roster.
    async fn roster_contains(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Envelope Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a delivered envelope for (consumer, checkpoint).
    ///
    /// Returns `true` if the envelope was stored, `false` if one already
    /// exists for the pair. Existing envelopes are never overwritten.
    async fn insert_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
        envelope: &KeyEnvelope,
    ) -> Result<bool>;

    /// Get the envelope delivered to (consumer, checkpoint), if any.
    async fn get_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<Option<KeyEnvelope>>;

    /// Whether an envelope exists for (consumer, checkpoint).
    async fn has_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Registry Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// The next unused stream-derivation nonce. Starts at zero.
    async fn stream_nonce(&self) -> Result<u64>;

    /// The sequence marker of the latest published checkpoint, or zero
    /// when nothing has been published yet.
    async fn publish_sequence(&self) -> Result<u64>;
}
