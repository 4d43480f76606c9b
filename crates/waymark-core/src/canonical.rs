//! Canonical CBOR encoding for deterministic identifier derivation.
//!
//! Follows RFC 8949 Core Deterministic Encoding: map keys ordered by their
//! encoded bytes, shortest-form integers, definite lengths, and no floats
//! (timestamps travel as i64 milliseconds). Equal derivation inputs must
//! yield byte-equal preimages everywhere, or identifiers stop matching
//! across implementations.

use ciborium::value::Value;

use crate::stream::StreamId;
use crate::types::{CheckpointId, Digest};

/// Domain prefix for checkpoint identifier derivation.
pub const CHECKPOINT_ID_DOMAIN: &[u8] = b"waymark/checkpoint-id/v1";

/// Domain prefix for stream identifier derivation.
pub const STREAM_ID_DOMAIN: &[u8] = b"waymark/stream-id/v1";

/// Preimage field keys. All stay below 24 so each encodes as one byte.
mod keys {
    pub const STREAM_ID: u64 = 0;
    pub const PREDECESSOR: u64 = 1;
    pub const STATE_COMMITMENT: u64 = 2;
    pub const CIPHERTEXT_HASH: u64 = 3;
    pub const MANIFEST_HASH: u64 = 4;
    pub const TIMESTAMP: u64 = 5;
    pub const SEQUENCE: u64 = 6;
}

/// Encode the checkpoint identifier preimage to canonical CBOR bytes.
///
/// The preimage covers every field that defines a checkpoint's identity:
/// the stream it belongs to, its predecessor (null for the first record),
/// the three content commitments, and the commit-time timestamp and
/// registry sequence marker. The ciphertext storage pointer is deliberately
/// absent so pointer migration never changes an identifier.
pub fn checkpoint_preimage(
    stream_id: &StreamId,
    predecessor: Option<&CheckpointId>,
    state_commitment: &Digest,
    ciphertext_hash: &Digest,
    manifest_hash: &Digest,
    timestamp: i64,
    sequence: u64,
) -> Vec<u8> {
    let mut entries = Vec::with_capacity(7);

    // 0: stream_id
    entries.push((
        Value::Integer(keys::STREAM_ID.into()),
        Value::Bytes(stream_id.0.to_vec()),
    ));

    // 1: predecessor (null or bytes)
    let prev_value = match predecessor {
        Some(id) => Value::Bytes(id.0.to_vec()),
        None => Value::Null,
    };
    entries.push((Value::Integer(keys::PREDECESSOR.into()), prev_value));

    // 2: state_commitment
    entries.push((
        Value::Integer(keys::STATE_COMMITMENT.into()),
        Value::Bytes(state_commitment.0.to_vec()),
    ));

    // 3: ciphertext_hash
    entries.push((
        Value::Integer(keys::CIPHERTEXT_HASH.into()),
        Value::Bytes(ciphertext_hash.0.to_vec()),
    ));

    // 4: manifest_hash
    entries.push((
        Value::Integer(keys::MANIFEST_HASH.into()),
        Value::Bytes(manifest_hash.0.to_vec()),
    ));

    // 5: timestamp
    entries.push((
        Value::Integer(keys::TIMESTAMP.into()),
        Value::Integer(timestamp.into()),
    ));

    // 6: sequence
    entries.push((
        Value::Integer(keys::SEQUENCE.into()),
        Value::Integer(sequence.into()),
    ));

    encode_cbor_value_canonical(&Value::Map(entries))
}

/// Derive a checkpoint identifier from its preimage fields.
///
/// Identifier = Blake3(CHECKPOINT_ID_DOMAIN || canonical preimage).
pub fn derive_checkpoint_id(
    stream_id: &StreamId,
    predecessor: Option<&CheckpointId>,
    state_commitment: &Digest,
    ciphertext_hash: &Digest,
    manifest_hash: &Digest,
    timestamp: i64,
    sequence: u64,
) -> CheckpointId {
    let preimage = checkpoint_preimage(
        stream_id,
        predecessor,
        state_commitment,
        ciphertext_hash,
        manifest_hash,
        timestamp,
        sequence,
    );
    let mut hasher = blake3::Hasher::new();
    hasher.update(CHECKPOINT_ID_DOMAIN);
    hasher.update(&preimage);
    CheckpointId(*hasher.finalize().as_bytes())
}

/// Encode a CBOR value in canonical form: sorted map keys, shortest-form
/// integers, definite lengths.
pub fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, *i);
        }
        Value::Bytes(b) => {
            encode_bytes(buf, b);
        }
        Value::Text(s) => {
            encode_text(buf, s);
        }
        Value::Array(arr) => {
            encode_array(buf, arr);
        }
        Value::Map(entries) => {
            encode_map_canonical(buf, entries);
        }
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
        }
        Value::Null => {
            buf.push(0xf6);
        }
        Value::Float(_) => {
            panic!("floats not supported in canonical encoding");
        }
        _ => {
            panic!("unsupported CBOR value type");
        }
    }
}

// Major type 0 for non-negative values, major type 1 for negatives
// (which CBOR stores as -1-n, so -1 is argument 0).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

// Shortest-form argument encoding under the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

// Canonical map form: entries emitted in lexicographic order of their
// encoded key bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
