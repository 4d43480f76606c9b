//! Proptest generators for property-based testing.

use proptest::prelude::*;

use waymark_core::{
    checkpoint_preimage, AccountId, Checkpoint, CheckpointDraft, CheckpointId, ConsumeScope,
    Digest, EntitlementPolicy, StreamId,
};

/// Generate a random AccountId.
pub fn account_id() -> impl Strategy<Value = AccountId> {
    any::<[u8; 32]>().prop_map(AccountId::from_bytes)
}

/// Generate a random CheckpointId.
pub fn checkpoint_id() -> impl Strategy<Value = CheckpointId> {
    any::<[u8; 32]>().prop_map(CheckpointId::from_bytes)
}

/// Generate a random StreamId.
pub fn stream_id() -> impl Strategy<Value = StreamId> {
    any::<[u8; 32]>().prop_map(StreamId::from_bytes)
}

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate a registry sequence marker.
pub fn sequence() -> impl Strategy<Value = u64> {
    0u64..=u64::MAX / 2
}

/// Generate a consume scope.
pub fn consume_scope() -> impl Strategy<Value = ConsumeScope> {
    prop_oneof![
        Just(ConsumeScope::PerCheckpoint),
        Just(ConsumeScope::Universal),
    ]
}

/// Generate a valid entitlement policy.
///
/// Threshold minimums start at one; a zero minimum is rejected by
/// [`EntitlementPolicy::validate`].
pub fn policy() -> impl Strategy<Value = EntitlementPolicy> {
    prop_oneof![
        (any::<u128>(), consume_scope())
            .prop_map(|(cost, scope)| EntitlementPolicy::Counted { cost, scope }),
        (1u128..=u128::MAX).prop_map(|minimum| EntitlementPolicy::Threshold { minimum }),
        any::<bool>().prop_map(|open| EntitlementPolicy::Allowlist { open }),
    ]
}

/// Generate a tag.
pub fn tag() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.-]{0,31}".prop_map(String::from)
}

/// Generate a ciphertext storage pointer.
pub fn pointer() -> impl Strategy<Value = String> {
    "(ipfs|s3)://[a-z0-9]{8,46}".prop_map(String::from)
}

/// Generate a stream name.
pub fn stream_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

/// The inputs that define a checkpoint identifier.
#[derive(Debug, Clone)]
pub struct DerivationParams {
    pub stream_id: StreamId,
    pub predecessor: Option<CheckpointId>,
    pub state_commitment: Digest,
    pub ciphertext_hash: Digest,
    pub manifest_hash: Digest,
    pub timestamp: i64,
    pub sequence: u64,
}

impl Arbitrary for DerivationParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),           // stream
            any::<Option<[u8; 32]>>(),   // predecessor
            any::<[u8; 32]>(),           // state commitment
            any::<[u8; 32]>(),           // ciphertext hash
            any::<[u8; 32]>(),           // manifest hash
            0i64..=1_700_000_000_000i64, // timestamp
            0u64..=1_000_000u64,         // sequence
        )
            .prop_map(
                |(stream, prev, state, cipher, manifest, ts, seq)| DerivationParams {
                    stream_id: StreamId::from_bytes(stream),
                    predecessor: prev.map(CheckpointId::from_bytes),
                    state_commitment: Digest::from_bytes(state),
                    ciphertext_hash: Digest::from_bytes(cipher),
                    manifest_hash: Digest::from_bytes(manifest),
                    timestamp: ts,
                    sequence: seq,
                },
            )
            .boxed()
    }
}

/// Seal a checkpoint from derivation parameters.
///
/// The storage pointer is fixed: it is not a derivation input.
pub fn checkpoint_from_params(params: &DerivationParams) -> Checkpoint {
    let draft = CheckpointDraft::new(
        params.state_commitment,
        params.ciphertext_hash,
        "memory://generated",
        params.manifest_hash,
    );
    Checkpoint::seal(
        params.stream_id,
        params.predecessor.map_or(0, |_| 1),
        params.predecessor,
        &draft,
        params.timestamp,
        params.sequence,
    )
}

/// Encode the identifier preimage for derivation parameters.
pub fn preimage_from_params(params: &DerivationParams) -> Vec<u8> {
    checkpoint_preimage(
        &params.stream_id,
        params.predecessor.as_ref(),
        &params.state_commitment,
        &params.ciphertext_hash,
        &params.manifest_hash,
        params.timestamp,
        params.sequence,
    )
}
