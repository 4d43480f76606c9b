//! Registry notifications.
//!
//! Every state-changing call emits one event on success, carrying the full
//! set of changed fields so an off-band indexer never has to re-read the
//! store. Events are delivered over a `tokio::sync::broadcast` channel;
//! see [`Registry::subscribe`](crate::Registry::subscribe).

use waymark_access::ConsumptionScope;
use waymark_core::{
    AccountId, Checkpoint, CheckpointId, EntitlementPolicy, StreamId, TagShift,
};

/// A successful registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A stream was created.
    StreamCreated {
        stream_id: StreamId,
        publisher: AccountId,
        name: String,
        policy: EntitlementPolicy,
    },

    /// A checkpoint was appended to a stream's chain. `shift` carries any
    /// tag pairing displaced by the optional publish label.
    CheckpointPublished {
        stream_id: StreamId,
        checkpoint: Checkpoint,
        label: Option<String>,
        shift: TagShift,
    },

    /// A checkpoint's ciphertext pointer was rewritten.
    PointerUpdated {
        stream_id: StreamId,
        checkpoint_id: CheckpointId,
        old: String,
        new: String,
    },

    /// A tag was bound to a checkpoint, displacing whatever either side
    /// was previously paired with.
    TagAssigned {
        stream_id: StreamId,
        checkpoint_id: CheckpointId,
        tag: String,
        shift: TagShift,
    },

    /// Write authority moved to a new account.
    PublisherTransferred {
        stream_id: StreamId,
        previous: AccountId,
        next: AccountId,
    },

    /// Accounts were added to or removed from the allowlist roster.
    RosterUpdated {
        stream_id: StreamId,
        added: Vec<AccountId>,
        removed: Vec<AccountId>,
    },

    /// A counted-mode consumption was recorded.
    ConsumptionRecorded {
        stream_id: StreamId,
        account: AccountId,
        scope: ConsumptionScope,
    },

    /// A key envelope was stored, addressed to the consumer so they can
    /// discover delivery without polling the full store.
    EnvelopeDelivered {
        stream_id: StreamId,
        consumer: AccountId,
        checkpoint_id: CheckpointId,
    },
}
