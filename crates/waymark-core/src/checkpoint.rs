//! Checkpoint: one immutable, hash-linked record in a stream's chain.
//!
//! A checkpoint carries no payload data, only commitments over data held
//! elsewhere: a state commitment (hash of canonical plaintext), a ciphertext
//! hash, a manifest hash, and an opaque storage pointer for the ciphertext.
//! Every field except the storage pointer is frozen at publish time.

use serde::{Deserialize, Serialize};

use crate::canonical::derive_checkpoint_id;
use crate::stream::StreamId;
use crate::types::{CheckpointId, Digest};

/// The publisher-supplied inputs to a publish call.
///
/// The pointer and optional label ride along with the commitments but are
/// not derivation inputs; changing them never changes the resulting
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDraft {
    /// Hash of the canonical plaintext state.
    pub state_commitment: Digest,

    /// Hash of the encrypted bytes.
    pub ciphertext_hash: Digest,

    /// Where the ciphertext currently lives. Opaque to the ledger.
    pub ciphertext_pointer: String,

    /// Hash of the execution/provenance manifest.
    pub manifest_hash: Digest,

    /// Optional tag to assign in the same operation.
    pub label: Option<String>,
}

impl CheckpointDraft {
    /// Create a draft with no label.
    pub fn new(
        state_commitment: Digest,
        ciphertext_hash: Digest,
        ciphertext_pointer: impl Into<String>,
        manifest_hash: Digest,
    ) -> Self {
        Self {
            state_commitment,
            ciphertext_hash,
            ciphertext_pointer: ciphertext_pointer.into(),
            manifest_hash,
            label: None,
        }
    }

    /// Attach a label to assign at publish time.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One committed checkpoint record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The derived identifier. Cached at seal time; recomputable from the
    /// other fields via [`Checkpoint::compute_id`].
    pub id: CheckpointId,

    /// The stream this checkpoint belongs to.
    pub stream_id: StreamId,

    /// Zero-based position within the stream.
    pub seq: u64,

    /// Identifier of the prior head, or `None` for the first checkpoint.
    pub prev: Option<CheckpointId>,

    /// Hash of the canonical plaintext state.
    pub state_commitment: Digest,

    /// Hash of the encrypted bytes.
    pub ciphertext_hash: Digest,

    /// Where the ciphertext currently lives. The only mutable field.
    pub ciphertext_pointer: String,

    /// Hash of the execution/provenance manifest.
    pub manifest_hash: Digest,

    /// Commit-time unix timestamp in milliseconds.
    pub timestamp: i64,

    /// Registry-wide publish sequence marker at commit time.
    pub sequence: u64,
}

impl Checkpoint {
    /// Seal a draft into a checkpoint record, deriving its identifier.
    pub fn seal(
        stream_id: StreamId,
        seq: u64,
        prev: Option<CheckpointId>,
        draft: &CheckpointDraft,
        timestamp: i64,
        sequence: u64,
    ) -> Self {
        let id = derive_checkpoint_id(
            &stream_id,
            prev.as_ref(),
            &draft.state_commitment,
            &draft.ciphertext_hash,
            &draft.manifest_hash,
            timestamp,
            sequence,
        );
        Self {
            id,
            stream_id,
            seq,
            prev,
            state_commitment: draft.state_commitment,
            ciphertext_hash: draft.ciphertext_hash,
            ciphertext_pointer: draft.ciphertext_pointer.clone(),
            manifest_hash: draft.manifest_hash,
            timestamp,
            sequence,
        }
    }

    /// Recompute the identifier from this record's fields.
    ///
    /// Equals `self.id` for any record sealed by this crate; the storage
    /// pointer does not participate.
    pub fn compute_id(&self) -> CheckpointId {
        derive_checkpoint_id(
            &self.stream_id,
            self.prev.as_ref(),
            &self.state_commitment,
            &self.ciphertext_hash,
            &self.manifest_hash,
            self.timestamp,
            self.sequence,
        )
    }

    /// Whether this is the first checkpoint of its stream.
    pub fn is_genesis(&self) -> bool {
        self.prev.is_none()
    }
}
