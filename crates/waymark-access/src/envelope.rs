//! Key envelopes: write-once wrapped-key records.
//!
//! An envelope carries a decryption key wrapped by the publisher for one
//! consumer, under an external hybrid scheme the ledger never runs. The
//! ledger stores the triple (wrapped key, nonce, sender public key)
//! verbatim and never interprets it; its whole job is to refuse delivery to
//! ineligible readers and to prevent overwrite.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AccessError;

/// Maximum size of a wrapped key, in bytes.
///
/// The bound caps storage cost, nothing more; a wrapped 32-byte key plus
/// AEAD tag is well under it.
pub const MAX_WRAPPED_KEY_LEN: usize = 512;

/// The 96-bit nonce the external wrapping scheme used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeNonce(pub [u8; 12]);

impl EnvelopeNonce {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl TryFrom<&[u8]> for EnvelopeNonce {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 12] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// The publisher's ephemeral public key used for wrapping.
///
/// Opaque to the ledger; consumers feed it into the external unwrapping
/// scheme. The all-zero value is rejected at delivery.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EphemeralPublicKey(pub [u8; 32]);

impl EphemeralPublicKey {
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

    /// Whether this is the (invalid) all-zero key.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for EphemeralPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralPublicKey({})", &self.to_hex()[..16])
    }
}

impl TryFrom<&[u8]> for EphemeralPublicKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// The publisher-supplied inputs to a delivery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeDraft {
    /// The wrapped decryption key.
    pub wrapped_key: Bytes,

    /// Nonce the wrapping scheme used.
    pub nonce: EnvelopeNonce,

    /// The publisher's ephemeral public key.
    pub sender_public: EphemeralPublicKey,
}

impl EnvelopeDraft {
    /// Create a draft.
    pub fn new(
        wrapped_key: impl Into<Bytes>,
        nonce: EnvelopeNonce,
        sender_public: EphemeralPublicKey,
    ) -> Self {
        Self {
            wrapped_key: wrapped_key.into(),
            nonce,
            sender_public,
        }
    }

    /// Check the storage-facing bounds.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.wrapped_key.is_empty() {
            return Err(AccessError::EmptyWrappedKey);
        }
        if self.wrapped_key.len() > MAX_WRAPPED_KEY_LEN {
            return Err(AccessError::WrappedKeyTooLarge {
                len: self.wrapped_key.len(),
                max: MAX_WRAPPED_KEY_LEN,
            });
        }
        if self.sender_public.is_zero() {
            return Err(AccessError::ZeroSenderKey);
        }
        Ok(())
    }
}

/// One stored envelope, write-once per (consumer, checkpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEnvelope {
    /// The wrapped decryption key, stored verbatim.
    pub wrapped_key: Bytes,

    /// Nonce the wrapping scheme used.
    pub nonce: EnvelopeNonce,

    /// The publisher's ephemeral public key.
    pub sender_public: EphemeralPublicKey,

    /// Delivery time (unix ms).
    pub delivered_at: i64,
}

impl KeyEnvelope {
    /// Freeze a validated draft at delivery time.
    pub fn from_draft(draft: EnvelopeDraft, delivered_at: i64) -> Self {
        Self {
            wrapped_key: draft.wrapped_key,
            nonce: draft.nonce,
            sender_public: draft.sender_public,
            delivered_at,
        }
    }
}
