//! Error types for the keystream pipeline.
//!
//! Strongly-typed errors for each layer: configuration (rejected before any
//! session exists), backend calls (carrying the backend status code), ring
//! buffer precondition violations, and the session errors that wrap them.
//!
//! Nothing here is retried. Replaying a CTR dispatch without resynchronising
//! the counter would reuse keystream.

use std::fmt;

use thiserror::Error;

use crate::backend::DeviceKind;

/// Backend call sites that can report a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// Listing the devices a platform exposes
    EnumerateDevices,
    /// Creating the execution context for the selected device
    CreateContext,
    /// Creating the command queue
    CreateQueue,
    /// Loading and building the precompiled kernel program
    BuildProgram,
    /// Creating the kernel entry point
    CreateKernel,
    /// Allocating a device-side buffer
    AllocateBuffer,
    /// Uploading key schedule, nonce and lookup tables
    UploadConstants,
    /// Running the kernel over a counter range
    Dispatch,
    /// Copying generated keystream back to the host
    ReadBack,
    /// Wiping and releasing device resources
    Release,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EnumerateDevices => "enumerate devices",
            Self::CreateContext => "create context",
            Self::CreateQueue => "create queue",
            Self::BuildProgram => "build program",
            Self::CreateKernel => "create kernel",
            Self::AllocateBuffer => "allocate buffer",
            Self::UploadConstants => "upload constants",
            Self::Dispatch => "dispatch",
            Self::ReadBack => "read back",
            Self::Release => "release",
        };
        f.write_str(name)
    }
}

/// A non-success status reported by a compute backend.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("backend {op} failed with status {status}")]
pub struct BackendError {
    /// The call that failed
    pub op: BackendOp,
    /// Backend-specific status code
    pub status: i32,
}

impl BackendError {
    /// Create a backend error for `op` with a raw status code.
    pub fn new(op: BackendOp, status: i32) -> Self {
        Self { op, status }
    }
}

/// Invalid [`crate::SessionConfig`] values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The ring buffer must hold at least one block
    #[error("ring buffer capacity must be at least one block")]
    ZeroRingCapacity,

    /// Admission must allow at least one block per dispatch
    #[error("in-flight block limit must be at least one")]
    ZeroInflightLimit,

    /// Ring size in bytes does not fit in `usize`
    #[error("ring buffer of {blocks} blocks exceeds addressable memory")]
    RingTooLarge {
        /// Requested ring capacity in blocks
        blocks: usize,
    },
}

/// Ring buffer precondition violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// Refill asked to append more bytes than are free
    #[error("ring overflow: {requested} bytes requested, {free} free")]
    Overflow {
        /// Bytes the caller tried to append
        requested: usize,
        /// Free bytes at the time of the call
        free: usize,
    },

    /// Consume asked for more bytes than are buffered
    #[error("ring underflow: {requested} bytes requested, {available} buffered")]
    Underflow {
        /// Bytes the caller tried to consume
        requested: usize,
        /// Buffered bytes at the time of the call
        available: usize,
    },
}

/// Errors surfaced by [`crate::StreamSession`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session configuration rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No device exists at the requested index
    #[error("device {index} not found ({available} available)")]
    DeviceNotFound {
        /// Requested device index
        index: usize,
        /// Number of enumerated devices
        available: usize,
    },

    /// No precompiled kernel matches the device
    #[error("no kernel variant for {kind:?} device with {address_bits}-bit addressing")]
    NoKernelVariant {
        /// Device category
        kind: DeviceKind,
        /// Device address width
        address_bits: u32,
    },

    /// Backend resource acquisition failed; the session was never created
    #[error("backend initialisation failed: {0}")]
    Acquisition(BackendError),

    /// Keystream dispatch failed part way through a transform
    #[error("dispatch failed after {processed} bytes: {source}")]
    Dispatch {
        /// Underlying backend failure
        source: BackendError,
        /// Bytes of the caller's buffer transformed before the failure
        processed: usize,
    },

    /// Host buffer allocation failed
    #[error("failed to allocate {bytes} bytes of host memory")]
    Allocation {
        /// Size of the failed allocation
        bytes: usize,
    },

    /// Internal ring buffer accounting violated
    #[error("ring buffer error: {0}")]
    Ring(#[from] RingError),

    /// Teardown failed to wipe or release backend resources
    #[error("teardown failed: {0}")]
    Teardown(BackendError),
}

impl SessionError {
    /// Bytes transformed before the failure.
    ///
    /// Non-zero only for [`SessionError::Dispatch`]; every other error fires
    /// before the caller's buffer is touched.
    pub fn processed(&self) -> usize {
        match self {
            Self::Dispatch { processed, .. } => *processed,
            _ => 0,
        }
    }

    /// Returns true if this error was detected before any backend resource
    /// was acquired.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DeviceNotFound { .. } | Self::NoKernelVariant { .. }
        )
    }

    /// The backend status code, when the error came from a backend call.
    pub fn backend_status(&self) -> Option<i32> {
        match self {
            Self::Acquisition(err) | Self::Teardown(err) | Self::Dispatch { source: err, .. } => {
                Some(err.status)
            },
            _ => None,
        }
    }
}
