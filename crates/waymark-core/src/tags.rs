//! Bidirectional tag registry for one stream.
//!
//! A tag names exactly one checkpoint, and a checkpoint carries at most one
//! tag. Both directions live in this one structure and are only ever
//! updated together, inside [`TagMap::assign`], so no torn state between
//! the forward and reverse maps can be observed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::CheckpointId;

/// What an assignment displaced, if anything.
///
/// Carried into the tag-assigned notification so indexers see the full
/// effect of a reassignment without replaying history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagShift {
    /// The checkpoint that previously held the tag, now untagged.
    pub untagged: Option<CheckpointId>,

    /// The tag the target checkpoint previously carried, now unbound.
    pub unbound: Option<String>,
}

impl TagShift {
    /// Whether the assignment displaced anything.
    pub fn is_clean(&self) -> bool {
        self.untagged.is_none() && self.unbound.is_none()
    }
}

/// Per-stream tag state: label -> checkpoint and checkpoint -> label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMap {
    forward: HashMap<String, CheckpointId>,
    reverse: HashMap<CheckpointId, String>,
}

impl TagMap {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tag` to `checkpoint`, clearing both sides of any prior pairing.
    ///
    /// If the tag currently names a different checkpoint, that checkpoint's
    /// reverse entry is cleared; if the checkpoint currently carries a
    /// different tag, that tag's forward entry is cleared; then both
    /// directions are set to the new pairing. Re-binding an existing
    /// pairing is a no-op that displaces nothing.
    pub fn assign(&mut self, checkpoint: CheckpointId, tag: &str) -> TagShift {
        let mut shift = TagShift::default();

        if let Some(&current) = self.forward.get(tag) {
            if current == checkpoint {
                return shift;
            }
            self.reverse.remove(&current);
            shift.untagged = Some(current);
        }

        if let Some(old_tag) = self.reverse.get(&checkpoint).cloned() {
            if old_tag != tag {
                self.forward.remove(&old_tag);
                shift.unbound = Some(old_tag);
            }
        }

        self.forward.insert(tag.to_string(), checkpoint);
        self.reverse.insert(checkpoint, tag.to_string());
        shift
    }

    /// The checkpoint a tag names, if any.
    pub fn resolve(&self, tag: &str) -> Option<CheckpointId> {
        self.forward.get(tag).copied()
    }

    /// The tag a checkpoint carries, if any.
    pub fn tag_of(&self, checkpoint: &CheckpointId) -> Option<&str> {
        self.reverse.get(checkpoint).map(String::as_str)
    }

    /// Number of live pairings.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether no pairings exist.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterate over (tag, checkpoint) pairings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckpointId)> {
        self.forward.iter().map(|(t, c)| (t.as_str(), c))
    }
}
