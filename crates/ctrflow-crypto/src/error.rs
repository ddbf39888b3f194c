//! Error types for key material and keystream operations

use thiserror::Error;

/// Errors from parsing key material or generating keystream
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Byte input had the wrong length for the target type
    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Kind of material being parsed ("key", "nonce", ...)
        what: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Length supplied by the caller
        actual: usize,
    },

    /// Hex input had the wrong number of digits
    #[error("invalid {what} length: expected {expected} hex digits, got {actual}")]
    InvalidHexLength {
        /// Kind of material being parsed
        what: &'static str,
        /// Required number of hex digits
        expected: usize,
        /// Digits supplied by the caller
        actual: usize,
    },

    /// Hex input could not be decoded
    #[error("invalid {what} hex: {reason}")]
    InvalidHex {
        /// Kind of material being parsed
        what: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Keystream output buffer is not a whole number of blocks
    #[error("keystream buffer of {len} bytes is not a multiple of the block size")]
    UnalignedKeystream {
        /// Length of the rejected buffer
        len: usize,
    },
}
