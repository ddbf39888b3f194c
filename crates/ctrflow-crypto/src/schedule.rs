//! AES-128 key expansion
//!
//! Round key 0 is the key itself. Every later round key is derived from the
//! previous one, so the schedule is computed incrementally in a single pass.

use zeroize::Zeroize;

use crate::{
    tables::{RCON, SBOX},
    types::{BLOCK_SIZE, KEY_SIZE, Key, KeySchedule, ROUNDS, SCHEDULE_SIZE},
};

/// Byte positions of the previous round key's last word, rotated left by
/// one. Feeding them through the S-box yields `SubWord(RotWord(w[3]))`.
const ROT_WORD: [usize; 4] = [13, 14, 15, 12];

/// Expand a key into the eleven AES-128 round keys.
///
/// Control flow depends only on byte positions, never on key values.
pub fn expand(key: &Key) -> KeySchedule {
    let mut schedule = [0u8; SCHEDULE_SIZE];
    schedule[..KEY_SIZE].copy_from_slice(key.as_bytes());

    for round in 1..=ROUNDS {
        let (done, rest) = schedule.split_at_mut(round * BLOCK_SIZE);
        let prev = &done[(round - 1) * BLOCK_SIZE..];
        let next = &mut rest[..BLOCK_SIZE];
        advance_round_key(prev, next, RCON[round]);
    }

    let expanded = KeySchedule::from_bytes(schedule);
    // The array is `Copy`; wipe the stack copy left behind
    schedule.zeroize();
    expanded
}

/// Derive one round key from its predecessor.
///
/// - First word: `SubWord(RotWord(prev[3])) ^ rcon ^ prev[0]`
/// - Remaining words: `next[i - 1] ^ prev[i]`
fn advance_round_key(prev: &[u8], next: &mut [u8], rcon: u8) {
    for i in 0..4 {
        next[i] = SBOX[usize::from(prev[ROT_WORD[i]])] ^ prev[i];
    }
    next[0] ^= rcon;

    for i in 4..BLOCK_SIZE {
        next[i] = next[i - 4] ^ prev[i];
    }
}
