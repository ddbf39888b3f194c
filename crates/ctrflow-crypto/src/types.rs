//! Key material types for AES-128 CTR
//!
//! # Security Properties
//!
//! - `Key` and `KeySchedule` overwrite their bytes with zeros when dropped
//! - `Debug` output never contains key bytes
//! - `Nonce` is not secret but is still wiped at session teardown

use std::fmt;

use zeroize::Zeroize;

use crate::error::CryptoError;

/// AES block size in bytes. One keystream block covers this many data bytes.
pub const BLOCK_SIZE: usize = 16;

/// AES-128 key size in bytes.
pub const KEY_SIZE: usize = 16;

/// CTR nonce size in bytes. The remaining half of each input block is the
/// counter.
pub const NONCE_SIZE: usize = 8;

/// Number of AES-128 rounds.
pub const ROUNDS: usize = 10;

/// Expanded key schedule size: one round key per round plus the initial key.
pub const SCHEDULE_SIZE: usize = (ROUNDS + 1) * BLOCK_SIZE;

/// A 128-bit AES key.
///
/// Supplied once when a session is created and wiped when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a key out of a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(fixed_from_slice("key", bytes)?))
    }

    /// Parse a key from exactly 32 hex digits.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        Ok(Self(fixed_from_hex("key", text)?))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A 64-bit CTR nonce, fixed for the lifetime of a session.
///
/// # Invariants
///
/// - A (nonce, counter) pair must never be used twice under the same key.
///   This is a caller precondition.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Wrap raw nonce bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a nonce out of a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(fixed_from_slice("nonce", bytes)?))
    }

    /// Parse a nonce from exactly 16 hex digits.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        Ok(Self(fixed_from_hex("nonce", text)?))
    }

    /// Raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Overwrite the nonce with zeros.
    pub fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

impl Drop for Nonce {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// The expanded AES-128 key schedule: eleven 16-byte round keys.
///
/// Derived deterministically from a [`Key`] by [`crate::expand`]; immutable
/// afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySchedule([u8; SCHEDULE_SIZE]);

impl KeySchedule {
    pub(crate) fn from_bytes(bytes: [u8; SCHEDULE_SIZE]) -> Self {
        Self(bytes)
    }

    /// All round keys, round 0 first.
    pub fn as_bytes(&self) -> &[u8; SCHEDULE_SIZE] {
        &self.0
    }

    /// Round key `round` (0 is the original key, 10 the final round key).
    ///
    /// # Panics
    ///
    /// Panics if `round > ROUNDS`.
    pub fn round_key(&self, round: usize) -> &[u8; BLOCK_SIZE] {
        assert!(round <= ROUNDS, "round {round} out of range");
        let start = round * BLOCK_SIZE;
        let Ok(key) = <&[u8; BLOCK_SIZE]>::try_from(&self.0[start..start + BLOCK_SIZE]) else {
            unreachable!("round key slice is exactly one block");
        };
        key
    }

    /// Overwrite every round key with zeros.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeySchedule(<redacted>)")
    }
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn fixed_from_slice<const N: usize>(
    what: &'static str,
    bytes: &[u8],
) -> Result<[u8; N], CryptoError> {
    <[u8; N]>::try_from(bytes).map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

fn fixed_from_hex<const N: usize>(what: &'static str, text: &str) -> Result<[u8; N], CryptoError> {
    if text.len() != N * 2 {
        return Err(CryptoError::InvalidHexLength { what, expected: N * 2, actual: text.len() });
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out)
        .map_err(|e| CryptoError::InvalidHex { what, reason: e.to_string() })?;
    Ok(out)
}
