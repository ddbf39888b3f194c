//! CLI error types and exit codes.

use std::{io, path::PathBuf};

use ctrflow_core::{BackendError, ConfigError, SessionError};
use ctrflow_crypto::CryptoError;
use thiserror::Error;

/// Errors that end a `ctrflow` run.
///
/// Each variant maps to a distinct process exit code so scripts can tell
/// failure points apart without parsing stderr.
#[derive(Error, Debug)]
pub enum CliError {
    /// The input file could not be opened for reading and writing
    #[error("cannot open {}: {source}", path.display())]
    File {
        /// Path given on the command line
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Device index is malformed, out of range or has no kernel
    #[error("bad device: {0}")]
    Device(String),

    /// In-flight limit, ring size or chunk size rejected
    #[error("bad limit: {0}")]
    Limit(String),

    /// Key is not exactly 32 hex digits
    #[error("malformed key: {0}")]
    Key(CryptoError),

    /// Nonce is not exactly 16 hex digits
    #[error("malformed nonce: {0}")]
    Nonce(CryptoError),

    /// Backend resources could not be acquired or released
    #[error("backend initialisation failed: {0}")]
    Backend(SessionError),

    /// A dispatch failed; the file is transformed up to `offset`
    #[error("short transform: file transformed up to byte {offset}: {source}")]
    ShortTransform {
        /// File offset of the first untransformed byte
        offset: u64,
        /// Backend failure that stopped the transform
        source: BackendError,
    },

    /// The transformed chunk could not be written back in full
    #[error("short write at byte {offset}: {expected} bytes pending")]
    ShortWrite {
        /// File offset the write started at
        offset: u64,
        /// Bytes that should have been written
        expected: usize,
    },

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::File { .. } => 1,
            Self::Device(_) => 2,
            Self::Limit(_) => 3,
            Self::Key(_) => 4,
            Self::Nonce(_) => 5,
            Self::Backend(_) => 6,
            Self::ShortTransform { .. } | Self::ShortWrite { .. } => 7,
            Self::Io(_) => 8,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Limit(err.to_string())
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Config(err) => err.into(),
            SessionError::DeviceNotFound { .. } | SessionError::NoKernelVariant { .. } => {
                Self::Device(err.to_string())
            },
            SessionError::Dispatch { source, processed } => {
                Self::ShortTransform { offset: processed as u64, source }
            },
            SessionError::Acquisition(_)
            | SessionError::Allocation { .. }
            | SessionError::Ring(_)
            | SessionError::Teardown(_) => Self::Backend(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use ctrflow_core::{BackendOp, DeviceKind};

    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_failure_point() {
        let errors = [
            CliError::File { path: "x".into(), source: io::Error::other("gone") },
            CliError::Device("3".to_string()),
            CliError::Limit("0".to_string()),
            CliError::Key(CryptoError::InvalidLength { what: "key", expected: 16, actual: 1 }),
            CliError::Nonce(CryptoError::InvalidLength { what: "nonce", expected: 8, actual: 1 }),
            CliError::Backend(SessionError::Allocation { bytes: 1 }),
            CliError::ShortTransform {
                offset: 0,
                source: BackendError::new(BackendOp::Dispatch, -5),
            },
            CliError::Io(io::Error::other("disk")),
        ];

        let codes: Vec<u8> = errors.iter().map(CliError::exit_code).collect();
        assert_eq!(codes, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn short_write_shares_short_transform_code() {
        assert_eq!(CliError::ShortWrite { offset: 0, expected: 16 }.exit_code(), 7);
    }

    #[test]
    fn session_errors_map_to_failure_points() {
        let device: CliError = SessionError::DeviceNotFound { index: 2, available: 1 }.into();
        assert_eq!(device.exit_code(), 2);

        let kernel: CliError =
            SessionError::NoKernelVariant { kind: DeviceKind::Accelerator, address_bits: 64 }
                .into();
        assert_eq!(kernel.exit_code(), 2);

        let limit: CliError = SessionError::Config(ConfigError::ZeroInflightLimit).into();
        assert_eq!(limit.exit_code(), 3);

        let backend: CliError =
            SessionError::Acquisition(BackendError::new(BackendOp::CreateQueue, -6)).into();
        assert_eq!(backend.exit_code(), 6);
    }
}
