//! Portable AES-128 block kernel
//!
//! Reference implementation of the per-block cipher that compute backends
//! run. Accelerated backends must agree with it bit for bit.
//!
//! The state is the 16-byte block in FIPS-197 column-major order: byte
//! `r + 4c` is row `r`, column `c`.

use crate::{
    tables::SBOX,
    types::{BLOCK_SIZE, KeySchedule, ROUNDS},
};

/// Encrypt one block in place with an expanded key schedule.
pub fn encrypt_block(schedule: &KeySchedule, block: &mut [u8; BLOCK_SIZE]) {
    add_round_key(block, schedule.round_key(0));

    for round in 1..ROUNDS {
        sub_bytes(block);
        shift_rows(block);
        mix_columns(block);
        add_round_key(block, schedule.round_key(round));
    }

    sub_bytes(block);
    shift_rows(block);
    add_round_key(block, schedule.round_key(ROUNDS));
}

fn add_round_key(state: &mut [u8; BLOCK_SIZE], round_key: &[u8; BLOCK_SIZE]) {
    for (byte, key) in state.iter_mut().zip(round_key) {
        *byte ^= key;
    }
}

fn sub_bytes(state: &mut [u8; BLOCK_SIZE]) {
    for byte in state.iter_mut() {
        *byte = SBOX[usize::from(*byte)];
    }
}

/// Row `r` rotates left by `r` columns.
fn shift_rows(state: &mut [u8; BLOCK_SIZE]) {
    let old = *state;
    for col in 0..4 {
        for row in 1..4 {
            state[row + 4 * col] = old[row + 4 * ((col + row) % 4)];
        }
    }
}

fn mix_columns(state: &mut [u8; BLOCK_SIZE]) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        let all = a0 ^ a1 ^ a2 ^ a3;
        column[0] = a0 ^ all ^ xtime(a0 ^ a1);
        column[1] = a1 ^ all ^ xtime(a1 ^ a2);
        column[2] = a2 ^ all ^ xtime(a2 ^ a3);
        column[3] = a3 ^ all ^ xtime(a3 ^ a0);
    }
}

/// Multiply by `x` in GF(2^8), reducing by the AES polynomial without a
/// data-dependent branch.
fn xtime(byte: u8) -> u8 {
    let carry = 0u8.wrapping_sub(byte >> 7);
    (byte << 1) ^ (carry & 0x1b)
}
