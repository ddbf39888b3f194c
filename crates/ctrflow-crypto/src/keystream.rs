//! CTR keystream generation
//!
//! Block `i` of the keystream is `E(schedule, nonce ‖ i)` with the counter
//! encoded big-endian in the low half of the input block.

use crate::{
    block::encrypt_block,
    error::CryptoError,
    types::{BLOCK_SIZE, KeySchedule, NONCE_SIZE, Nonce},
};

/// Build the CTR input block for counter `index`.
///
/// Structure:
/// - bytes 0-7: nonce
/// - bytes 8-15: index (big-endian)
pub fn counter_block(nonce: &Nonce, index: u64) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[..NONCE_SIZE].copy_from_slice(nonce.as_bytes());
    block[NONCE_SIZE..].copy_from_slice(&index.to_be_bytes());
    block
}

/// Fill `out` with consecutive keystream blocks starting at counter `start`.
///
/// `out.len()` must be a whole number of blocks. The counter wraps at
/// `u64::MAX`, far beyond any realizable stream.
pub fn fill_keystream(
    schedule: &KeySchedule,
    nonce: &Nonce,
    start: u64,
    out: &mut [u8],
) -> Result<(), CryptoError> {
    if !out.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::UnalignedKeystream { len: out.len() });
    }

    for (offset, chunk) in out.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        let mut block = counter_block(nonce, start.wrapping_add(offset as u64));
        encrypt_block(schedule, &mut block);
        chunk.copy_from_slice(&block);
    }

    Ok(())
}

/// XOR `data` with the keystream starting at counter `start` in one pass.
///
/// A trailing partial block uses only the head of its keystream block. This
/// is the direct, non-buffered form of CTR; it serves as the reference for
/// buffered pipelines.
pub fn apply_keystream(schedule: &KeySchedule, nonce: &Nonce, start: u64, data: &mut [u8]) {
    for (offset, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut block = counter_block(nonce, start.wrapping_add(offset as u64));
        encrypt_block(schedule, &mut block);
        for (byte, key) in chunk.iter_mut().zip(block) {
            *byte ^= key;
        }
    }
}
