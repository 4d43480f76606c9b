//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical CBOR preimage bytes of the checkpoint
//! identifier derivation, so any other implementation can check its encoder
//! against them. The preimage frame is: a 7-entry map with integer keys
//! 0..=6 (stream, predecessor, state commitment, ciphertext hash, manifest
//! hash, timestamp, sequence), byte strings as `58 20` plus 32 bytes, and a
//! null predecessor for genesis records.

use serde::{Deserialize, Serialize};

use waymark_core::{
    checkpoint_preimage, Checkpoint, CheckpointDraft, CheckpointId, Digest, StreamId,
};

/// A golden test vector.
///
/// All byte fields are lowercase hex. `expected_preimage` pins the exact
/// canonical encoding; `expected_checkpoint_id` may be empty, in which case
/// only the preimage is checked and the derived id is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// Stream identifier (32 bytes).
    pub stream_id: String,
    /// Predecessor checkpoint id, absent for a genesis record.
    pub predecessor: Option<String>,
    /// State commitment digest.
    pub state_commitment: String,
    /// Ciphertext hash digest.
    pub ciphertext_hash: String,
    /// Manifest hash digest.
    pub manifest_hash: String,
    /// Commit timestamp (unix ms).
    pub timestamp: i64,
    /// Registry publish sequence marker.
    pub sequence: u64,
    /// Canonical CBOR preimage (hex).
    pub expected_preimage: String,
    /// Derived checkpoint id (hex), empty while unpinned.
    pub expected_checkpoint_id: String,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let zeros = "00".repeat(32);
    let aa = "aa".repeat(32);
    let ones = "01".repeat(32);
    let twos = "02".repeat(32);
    let threes = "03".repeat(32);

    vec![
        GoldenVector {
            name: "genesis with zero commitments".to_string(),
            stream_id: zeros.clone(),
            predecessor: None,
            state_commitment: zeros.clone(),
            ciphertext_hash: zeros.clone(),
            manifest_hash: zeros.clone(),
            timestamp: 0,
            sequence: 0,
            expected_preimage: [
                "a7",
                "00", "5820", &zeros,
                "01", "f6",
                "02", "5820", &zeros,
                "03", "5820", &zeros,
                "04", "5820", &zeros,
                "05", "00",
                "06", "00",
            ]
            .concat(),
            expected_checkpoint_id: String::new(),
        },
        GoldenVector {
            name: "genesis with distinct commitments".to_string(),
            stream_id: aa.clone(),
            predecessor: None,
            state_commitment: ones.clone(),
            ciphertext_hash: twos.clone(),
            manifest_hash: threes.clone(),
            timestamp: 1736870400000,
            sequence: 1,
            expected_preimage: [
                "a7",
                "00", "5820", &aa,
                "01", "f6",
                "02", "5820", &ones,
                "03", "5820", &twos,
                "04", "5820", &threes,
                // 1736870400000 = 0x194658b1000, eight-byte encoding
                "05", "1b00000194658b1000",
                "06", "01",
            ]
            .concat(),
            expected_checkpoint_id: String::new(),
        },
        {
            let stream = "11".repeat(32);
            let prev = "22".repeat(32);
            let state = "33".repeat(32);
            let cipher = "44".repeat(32);
            let manifest = "55".repeat(32);
            GoldenVector {
                name: "linked record at the one-byte integer boundary".to_string(),
                stream_id: stream.clone(),
                predecessor: Some(prev.clone()),
                state_commitment: state.clone(),
                ciphertext_hash: cipher.clone(),
                manifest_hash: manifest.clone(),
                // 23 is the last single-byte integer; 24 needs a length byte
                timestamp: 23,
                sequence: 24,
                expected_preimage: [
                    "a7",
                    "00", "5820", &stream,
                    "01", "5820", &prev,
                    "02", "5820", &state,
                    "03", "5820", &cipher,
                    "04", "5820", &manifest,
                    "05", "17",
                    "06", "1818",
                ]
                .concat(),
                expected_checkpoint_id: String::new(),
            }
        },
        {
            let stream = "ee".repeat(32);
            let prev = "0f".repeat(32);
            let state = "f0".repeat(32);
            let cipher = "0a".repeat(32);
            let manifest = "a0".repeat(32);
            GoldenVector {
                name: "linked record at the two-byte integer boundary".to_string(),
                stream_id: stream.clone(),
                predecessor: Some(prev.clone()),
                state_commitment: state.clone(),
                ciphertext_hash: cipher.clone(),
                manifest_hash: manifest.clone(),
                timestamp: 256,
                sequence: 65535,
                expected_preimage: [
                    "a7",
                    "00", "5820", &stream,
                    "01", "5820", &prev,
                    "02", "5820", &state,
                    "03", "5820", &cipher,
                    "04", "5820", &manifest,
                    "05", "190100",
                    "06", "19ffff",
                ]
                .concat(),
                expected_checkpoint_id: String::new(),
            }
        },
    ]
}

/// Seal a checkpoint from a golden vector's derivation inputs.
///
/// The storage pointer is fixed; it is not a derivation input.
pub fn checkpoint_from_vector(vector: &GoldenVector) -> Checkpoint {
    let draft = CheckpointDraft::new(
        digest_field(&vector.state_commitment),
        digest_field(&vector.ciphertext_hash),
        "memory://golden",
        digest_field(&vector.manifest_hash),
    );
    let predecessor = vector
        .predecessor
        .as_deref()
        .map(|h| CheckpointId::from_hex(h).expect("vector predecessor hex is well-formed"));
    Checkpoint::seal(
        StreamId::from_hex(&vector.stream_id).expect("vector stream hex is well-formed"),
        predecessor.map_or(0, |_| 1),
        predecessor,
        &draft,
        vector.timestamp,
        vector.sequence,
    )
}

/// Encode the canonical identifier preimage for a golden vector.
pub fn preimage_from_vector(vector: &GoldenVector) -> Vec<u8> {
    let predecessor = vector
        .predecessor
        .as_deref()
        .map(|h| CheckpointId::from_hex(h).expect("vector predecessor hex is well-formed"));
    checkpoint_preimage(
        &StreamId::from_hex(&vector.stream_id).expect("vector stream hex is well-formed"),
        predecessor.as_ref(),
        &digest_field(&vector.state_commitment),
        &digest_field(&vector.ciphertext_hash),
        &digest_field(&vector.manifest_hash),
        vector.timestamp,
        vector.sequence,
    )
}

/// Verify all golden vectors against the canonical encoder.
///
/// Each entry reports the vector name, whether it matched, and the derived
/// checkpoint id hex. If a vector's expected id is empty, only its preimage
/// is checked.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let preimage = hex::encode(preimage_from_vector(v));
            let id = checkpoint_from_vector(v).id.to_hex();

            let matches = preimage == v.expected_preimage
                && (v.expected_checkpoint_id.is_empty() || id == v.expected_checkpoint_id);

            (v.name.clone(), matches, id)
        })
        .collect()
}

fn digest_field(field: &str) -> Digest {
    Digest::from_hex(field).expect("vector digest hex is well-formed")
}
