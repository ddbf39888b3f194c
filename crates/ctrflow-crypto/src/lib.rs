//! ctrflow Cryptographic Primitives
//!
//! The host-side half of AES-128 in CTR mode. Pure functions with
//! deterministic outputs: no I/O, no logging, no global state.
//!
//! # Keystream Construction
//!
//! The key is expanded once into eleven round keys. Each 64-bit counter value
//! is concatenated with the session nonce to form one 128-bit input block,
//! which the block kernel encrypts into one keystream block.
//!
//! ```text
//! Key (16 bytes)
//!        │
//!        ▼ expand
//! KeySchedule (11 × 16 bytes)
//!        │
//!        ▼ encrypt_block(nonce ‖ counter)
//! Keystream Block[counter]
//!        │
//!        ▼ XOR
//! Ciphertext / Plaintext
//! ```
//!
//! # Security
//!
//! - Key material: `Key` and `KeySchedule` zero their bytes on drop
//! - Nonce reuse: (nonce, counter) pairs MUST NOT repeat under one key. This
//!   crate cannot enforce that; callers own nonce allocation
//! - Timing: key expansion and the block kernel never branch on key or state
//!   bytes
//! - No integrity: CTR is a raw stream cipher, flipped ciphertext bits flip the
//!   same plaintext bits

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod block;
pub mod error;
pub mod keystream;
pub mod schedule;
mod tables;
pub mod types;

pub use block::encrypt_block;
pub use error::CryptoError;
pub use keystream::{apply_keystream, counter_block, fill_keystream};
pub use schedule::expand;
pub use types::{
    BLOCK_SIZE, KEY_SIZE, Key, KeySchedule, NONCE_SIZE, Nonce, ROUNDS, SCHEDULE_SIZE,
};
