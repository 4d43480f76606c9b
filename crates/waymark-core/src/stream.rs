//! Stream: one independent checkpoint chain plus its configuration.
//!
//! A stream is owned by a single publisher and identified by an id derived
//! from (creator, registry nonce) under a domain prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::STREAM_ID_DOMAIN;
use crate::entitlement::EntitlementPolicy;
use crate::types::{AccountId, CheckpointId};

/// A 32-byte stream identifier.
///
/// Derived from Blake3(domain || creator || registry nonce). The nonce is a
/// monotonically incrementing counter owned by the registry, so two streams
/// created by the same account never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub [u8; 32]);

impl StreamId {
    /// Derive a stream ID from the creator identity and registry nonce.
    pub fn derive(creator: &AccountId, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STREAM_ID_DOMAIN);
        hasher.update(&creator.0);
        hasher.update(&nonce.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero stream ID (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for StreamId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for StreamId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for StreamId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// The persistent record of a stream.
///
/// Head and count track the chain; the publisher is mutable only via an
/// explicit transfer; the entitlement policy is fixed at creation; the
/// record itself is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// The stream identifier.
    pub stream_id: StreamId,

    /// The account with exclusive write authority. Never zero.
    pub publisher: AccountId,

    /// Display name.
    pub name: String,

    /// Entitlement policy, fixed at creation.
    pub policy: EntitlementPolicy,

    /// Identifier of the latest checkpoint, `None` while the chain is empty.
    pub head: Option<CheckpointId>,

    /// Number of checkpoints published so far.
    pub count: u64,

    /// Creation time (unix ms).
    pub created_at: i64,

    /// Last mutation time (unix ms).
    pub updated_at: i64,
}

impl StreamRecord {
    /// Create the record for a freshly created stream.
    pub fn new(
        stream_id: StreamId,
        publisher: AccountId,
        name: String,
        policy: EntitlementPolicy,
        now: i64,
    ) -> Self {
        Self {
            stream_id,
            publisher,
            name,
            policy,
            head: None,
            count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance head and count for a newly appended checkpoint.
    pub fn record_checkpoint(&mut self, id: CheckpointId, now: i64) {
        self.head = Some(id);
        self.count += 1;
        self.updated_at = now;
    }

    /// Whether the chain has any checkpoints yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::{ConsumeScope, EntitlementPolicy};

    fn policy() -> EntitlementPolicy {
        EntitlementPolicy::Counted {
            cost: 10,
            scope: ConsumeScope::PerCheckpoint,
        }
    }

    #[test]
    fn test_stream_id_derivation() {
        let creator = AccountId::from_bytes([0x11; 32]);
        let id1 = StreamId::derive(&creator, 0);
        let id2 = StreamId::derive(&creator, 0);
        assert_eq!(id1, id2);

        let id3 = StreamId::derive(&creator, 1);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_stream_id_different_creators() {
        let a = AccountId::from_bytes([0x01; 32]);
        let b = AccountId::from_bytes([0x02; 32]);

        let id1 = StreamId::derive(&a, 5);
        let id2 = StreamId::derive(&b, 5);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_stream_id_hex_roundtrip() {
        let creator = AccountId::from_bytes([0x33; 32]);
        let id = StreamId::derive(&creator, 42);
        let hex = id.to_hex();
        let recovered = StreamId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_stream_record_initial_state() {
        let creator = AccountId::from_bytes([0x11; 32]);
        let stream_id = StreamId::derive(&creator, 0);
        let record = StreamRecord::new(stream_id, creator, "alpha".into(), policy(), 1000);

        assert!(record.is_empty());
        assert_eq!(record.head, None);
        assert_eq!(record.count, 0);
        assert_eq!(record.created_at, 1000);
    }

    #[test]
    fn test_stream_record_advances() {
        let creator = AccountId::from_bytes([0x11; 32]);
        let stream_id = StreamId::derive(&creator, 0);
        let mut record = StreamRecord::new(stream_id, creator, "alpha".into(), policy(), 1000);

        let a = CheckpointId::from_bytes([1; 32]);
        let b = CheckpointId::from_bytes([2; 32]);

        record.record_checkpoint(a, 1001);
        assert_eq!(record.head, Some(a));
        assert_eq!(record.count, 1);

        record.record_checkpoint(b, 1002);
        assert_eq!(record.head, Some(b));
        assert_eq!(record.count, 2);
        assert_eq!(record.updated_at, 1002);
    }
}
