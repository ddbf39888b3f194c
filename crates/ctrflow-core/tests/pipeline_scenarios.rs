//! End-to-end scenarios for `StreamSession`
//!
//! Known-answer encryption, ring wraparound against the one-shot reference,
//! and failure handling through the chaotic platform.

use ctrflow_core::{
    BackendInit, BackendOp, ChaoticPlatform, ComputeBackend, HostPlatform, KernelVariant,
    Platform, SessionConfig, SessionError, StreamSession, backend::status,
};
use ctrflow_crypto::{BLOCK_SIZE, Key, Nonce, apply_keystream, expand};
use proptest::prelude::*;

const KEY: &str = "00112233445566778899aabbccddeeff";
const NONCE: &str = "0000000000000001";
const KEYSTREAM: &str = concat!(
    "b8c09bdba7378ff2499cf18537901d0b",
    "75312ceef13588a50550d782e78fd6ac",
    "3212910fed22673447f40fe6f936fd86",
);

fn key() -> Key {
    Key::from_hex(KEY).unwrap()
}

fn nonce() -> Nonce {
    Nonce::from_hex(NONCE).unwrap()
}

fn reference(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    apply_keystream(&expand(&key()), &nonce(), 0, &mut out);
    out
}

#[test]
fn forty_zero_bytes_round_trip() {
    let platform = HostPlatform::new();
    let expected = hex::decode(KEYSTREAM).unwrap();

    let mut data = [0u8; 40];
    let mut session =
        StreamSession::open(&platform, 0, key(), nonce(), SessionConfig::default()).unwrap();
    assert_eq!(session.crypt(&mut data).unwrap(), 40);
    assert_eq!(&data[..], &expected[..40]);
    session.close().unwrap();

    let mut session =
        StreamSession::open(&platform, 0, key(), nonce(), SessionConfig::default()).unwrap();
    assert_eq!(session.crypt(&mut data).unwrap(), 40);
    assert_eq!(data, [0u8; 40]);
}

#[test]
fn wrapping_ring_matches_one_shot_keystream() {
    // Three-block ring fed two blocks at a time: every other refill crosses
    // the physical end.
    let config = SessionConfig::default().with_ring_blocks(3).with_max_inflight_blocks(2);
    let mut session = StreamSession::open(&HostPlatform::new(), 0, key(), nonce(), config).unwrap();

    let plaintext: Vec<u8> = (0..64 * BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
    let mut data = plaintext.clone();
    for chunk in data.chunks_mut(2 * BLOCK_SIZE) {
        session.crypt(chunk).unwrap();
    }

    assert_eq!(data, reference(&plaintext));
}

#[test]
fn single_block_admission_still_fills_the_ring() {
    let config = SessionConfig::default().with_ring_blocks(8).with_max_inflight_blocks(1);
    let platform = ChaoticPlatform::new(HostPlatform::new());
    let mut session = StreamSession::open(&platform, 0, key(), nonce(), config).unwrap();

    let mut data = [0u8; BLOCK_SIZE];
    session.crypt(&mut data).unwrap();

    assert_eq!(platform.dispatch_attempts(), 8);
    assert_eq!(session.counter(), 8);
    assert_eq!(session.buffered(), 7 * BLOCK_SIZE);
}

#[test]
fn every_acquisition_step_failure_is_surfaced() {
    let steps = [
        BackendOp::EnumerateDevices,
        BackendOp::CreateContext,
        BackendOp::CreateQueue,
        BackendOp::BuildProgram,
        BackendOp::CreateKernel,
        BackendOp::AllocateBuffer,
        BackendOp::UploadConstants,
    ];

    for op in steps {
        let platform = ChaoticPlatform::new(HostPlatform::new()).failing_open_at(op);
        let err = StreamSession::open(&platform, 0, key(), nonce(), SessionConfig::default())
            .unwrap_err();

        match err {
            SessionError::Acquisition(source) => {
                assert_eq!(source.op, op);
                assert_eq!(source.status, status::INJECTED_FAILURE);
            },
            other => panic!("expected acquisition error for {op}, got {other:?}"),
        }
        assert_eq!(platform.releases(), 0, "nothing was acquired for {op}");
    }
}

#[test]
fn host_release_reverses_acquisition_order() {
    let platform = HostPlatform::new();
    let device = platform.devices().unwrap().remove(0);
    let schedule = expand(&key());
    let nonce = nonce();
    let init = BackendInit { schedule: &schedule, nonce: &nonce, capacity_blocks: 2 };
    let mut backend = platform.open(&device, KernelVariant::Cpu64, &init).unwrap();

    let acquired = backend.acquired().to_vec();
    backend.release().unwrap();
    let released: Vec<_> = backend.released().iter().rev().copied().collect();
    assert_eq!(released, acquired);
}

#[test]
fn prop_dispatch_failures_never_replay_keystream() {
    proptest!(|(
        failure_rate in 0.05f64..0.6,
        seed in any::<u64>(),
        len in 1usize..800,
        ring_blocks in 1usize..6,
        max_inflight in 1usize..4,
    )| {
        let config = SessionConfig::default()
            .with_ring_blocks(ring_blocks)
            .with_max_inflight_blocks(max_inflight);
        let platform =
            ChaoticPlatform::new(HostPlatform::new()).with_failure_rate(failure_rate, seed);
        let mut session = StreamSession::open(&platform, 0, key(), nonce(), config).unwrap();

        let plaintext: Vec<u8> = (0..len).map(|i| (i * 13) as u8).collect();
        let mut data = plaintext.clone();
        let mut offset = 0;
        let mut attempts = 0;

        // Resume at the reported offset until the whole buffer is done
        while offset < data.len() {
            attempts += 1;
            prop_assert!(attempts < 10_000, "no progress under chaos");

            match session.crypt(&mut data[offset..]) {
                Ok(done) => offset += done,
                Err(SessionError::Dispatch { processed, .. }) => {
                    prop_assert_eq!(processed % BLOCK_SIZE, 0);
                    prop_assert_eq!(&data[offset + processed..], &plaintext[offset + processed..]);
                    offset += processed;
                },
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        prop_assert_eq!(data, reference(&plaintext));
        prop_assert_eq!(session.counter(), platform.blocks_generated());
    });
}
