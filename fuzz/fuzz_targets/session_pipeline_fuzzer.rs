//! Fuzz target for the StreamSession pipeline
//!
//! Runs arbitrary `crypt`/`refill` sequences through a session on the host
//! platform, optionally under random dispatch failures, and compares the
//! final output with the one-shot keystream.
//!
//! # Invariants
//!
//! - Dispatch failures surface as errors with block-aligned progress
//! - Bytes past the reported progress are never touched
//! - Resuming at the reported offset yields the one-shot keystream
//! - `counter * 16 == consumed + buffered` after every call

#![no_main]

use arbitrary::Arbitrary;
use ctrflow_core::{ChaoticPlatform, HostPlatform, SessionConfig, SessionError, StreamSession};
use ctrflow_crypto::{BLOCK_SIZE, Key, Nonce, apply_keystream, expand};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct PipelineScenario {
    key: [u8; 16],
    nonce: [u8; 8],
    /// Ring capacity in blocks (1-16)
    ring_blocks: u8,
    /// Admission ceiling in blocks (1-8)
    max_inflight: u8,
    /// Seed for chaotic dispatch failures
    chaos_seed: u64,
    /// Failure rate 0-5 maps to 0%-50%
    failure_rate_tenth: u8,
    /// Plaintext length
    len: u16,
    operations: Vec<PipelineOperation>,
}

#[derive(Debug, Arbitrary)]
enum PipelineOperation {
    /// Crypt the next `blocks` whole blocks
    Crypt { blocks: u8 },
    /// Explicit refill
    Refill,
}

fuzz_target!(|scenario: PipelineScenario| {
    let config = SessionConfig::default()
        .with_ring_blocks((scenario.ring_blocks % 16) as usize + 1)
        .with_max_inflight_blocks((scenario.max_inflight % 8) as usize + 1);
    let failure_rate = (scenario.failure_rate_tenth % 6) as f64 / 10.0;
    let platform = ChaoticPlatform::new(HostPlatform::new())
        .with_failure_rate(failure_rate, scenario.chaos_seed);

    let Ok(mut session) = StreamSession::open(
        &platform,
        0,
        Key::from_bytes(scenario.key),
        Nonce::from_bytes(scenario.nonce),
        config,
    ) else {
        return;
    };

    let len = scenario.len as usize % 4096;
    let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
    let mut data = plaintext.clone();
    let mut offset = 0;

    let step = |session: &mut StreamSession<_>, data: &mut [u8], offset: &mut usize, want: usize| {
        let end = (*offset + want).min(data.len());
        match session.crypt(&mut data[*offset..end]) {
            Ok(done) => *offset += done,
            Err(SessionError::Dispatch { processed, .. }) => {
                assert_eq!(processed % BLOCK_SIZE, 0);
                assert_eq!(data[*offset + processed..], plaintext[*offset + processed..]);
                *offset += processed;
            },
            Err(other) => panic!("unexpected session error: {other}"),
        }
    };

    for op in scenario.operations {
        match op {
            PipelineOperation::Crypt { blocks } => {
                step(&mut session, &mut data, &mut offset, (blocks as usize % 32) * BLOCK_SIZE);
            },
            PipelineOperation::Refill => {
                let _ = session.refill();
            },
        }
        assert_eq!(
            session.counter() * BLOCK_SIZE as u64,
            session.consumed_blocks() * BLOCK_SIZE as u64 + session.buffered() as u64
        );
    }

    // Drain the rest, resuming after injected failures
    for _ in 0..10_000 {
        if offset >= data.len() {
            break;
        }
        let remaining = data.len() - offset;
        step(&mut session, &mut data, &mut offset, remaining);
    }
    if offset < data.len() {
        return;
    }

    let mut expected = plaintext.clone();
    apply_keystream(
        &expand(&Key::from_bytes(scenario.key)),
        &Nonce::from_bytes(scenario.nonce),
        0,
        &mut expected,
    );
    assert_eq!(data, expected);
});
