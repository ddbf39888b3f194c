//! Fuzz target for RingBuffer accounting
//!
//! Drives a ring with arbitrary refill/consume sequences and checks it
//! against a plain FIFO model.
//!
//! # Invariants
//!
//! - Overflow and underflow are reported as errors, never panics
//! - A rejected call leaves the ring unchanged
//! - `len() <= size()` at all times
//! - Consumed bytes come out in the order they were appended, wrap or not

#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use ctrflow_core::RingBuffer;
use ctrflow_crypto::BLOCK_SIZE;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct RingScenario {
    /// Ring capacity in blocks (1-64)
    blocks: u8,
    operations: Vec<RingOperation>,
}

#[derive(Debug, Arbitrary)]
enum RingOperation {
    /// Append `blocks` blocks of keystream
    Refill { blocks: u8 },
    /// Consume `bytes` bytes
    Consume { bytes: u16 },
    /// Zero the store and drop everything buffered
    Wipe,
}

fuzz_target!(|scenario: RingScenario| {
    let size = ((scenario.blocks % 64) as usize + 1) * BLOCK_SIZE;
    let mut ring = RingBuffer::new(size);
    let mut model: VecDeque<u8> = VecDeque::new();
    let mut next = 0u8;

    for op in scenario.operations {
        match op {
            RingOperation::Refill { blocks } => {
                let len = (blocks % 16) as usize * BLOCK_SIZE;
                let bytes: Vec<u8> = (0..len).map(|i| next.wrapping_add(i as u8)).collect();
                let before = ring.write_position();

                if ring.refill(&bytes).is_ok() {
                    model.extend(&bytes);
                    next = next.wrapping_add(len as u8);
                } else {
                    assert!(len > size - model.len(), "refill rejected with room to spare");
                    assert_eq!(ring.write_position(), before);
                }
            },
            RingOperation::Consume { bytes } => {
                let len = bytes as usize % (2 * size + 1);
                match ring.consume(len) {
                    Ok(view) => {
                        let expected: Vec<u8> = model.drain(..len).collect();
                        assert_eq!(view.to_vec(), expected);
                    },
                    Err(_) => assert!(len > model.len(), "consume rejected with data buffered"),
                }
            },
            RingOperation::Wipe => {
                ring.wipe();
                model.clear();
            },
        }

        assert_eq!(ring.len(), model.len());
        assert!(ring.len() <= ring.size());
    }
});
