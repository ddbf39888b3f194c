//! Compute backend abstraction.
//!
//! A [`Platform`] enumerates devices and opens a [`ComputeBackend`] on one of
//! them. The backend owns every device-side resource: context, queue, built
//! kernel, uploaded constants and the reusable keystream output buffer. The
//! session only ever asks it for "blocks `start..start + n`".
//!
//! ```text
//! Platform::devices ─► DeviceInfo ─► KernelVariant::select
//!                                           │
//!                       Platform::open ◄────┘
//!                             │
//!                             ▼
//!                      ComputeBackend::encrypt_blocks (repeated)
//!                             │
//!                             ▼
//!                      ComputeBackend::release
//! ```
//!
//! Acquisition is all-or-nothing: if any step of [`Platform::open`] fails,
//! the steps that already succeeded are undone before the error is returned.

mod chaotic;
mod host;

pub use chaotic::{ChaoticBackend, ChaoticPlatform};
pub use host::{HostBackend, HostPlatform};

use ctrflow_crypto::{KeySchedule, Nonce};

use crate::error::BackendError;

/// Status codes reported by the bundled backends.
///
/// Values follow the OpenCL conventions so they read the same in logs as
/// those of a real device runtime.
pub mod status {
    /// The device is gone or cannot run the requested kernel
    pub const DEVICE_NOT_AVAILABLE: i32 = -2;
    /// Not enough device or host memory
    pub const OUT_OF_RESOURCES: i32 = -5;
    /// Generic invalid argument
    pub const INVALID_VALUE: i32 = -30;
    /// The device handle is not valid for this platform
    pub const INVALID_DEVICE: i32 = -33;
    /// The kernel object is not valid (e.g. used after release)
    pub const INVALID_KERNEL: i32 = -48;
    /// A dispatch exceeded the output buffer
    pub const INVALID_BUFFER_SIZE: i32 = -61;
    /// Generic injected failure
    pub const INJECTED_FAILURE: i32 = -9999;
}

/// Broad category of a compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// General-purpose processor
    Cpu,
    /// Graphics processor
    Gpu,
    /// Anything else (FPGA, DSP, ...)
    Accelerator,
}

/// A device as reported by [`Platform::devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the platform's enumeration order
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Device category
    pub kind: DeviceKind,
    /// Device address width in bits (32 or 64)
    pub address_bits: u32,
}

/// Precompiled kernel artifacts, one per device category and address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    /// CPU, 32-bit addressing
    Cpu32,
    /// CPU, 64-bit addressing
    Cpu64,
    /// GPU, 32-bit addressing
    Gpu32,
    /// GPU, 64-bit addressing
    Gpu64,
}

impl KernelVariant {
    /// Pick the artifact matching a device, if one exists.
    ///
    /// Accelerators and address widths other than 32 and 64 have no
    /// artifact.
    pub fn select(kind: DeviceKind, address_bits: u32) -> Option<Self> {
        match (kind, address_bits) {
            (DeviceKind::Cpu, 32) => Some(Self::Cpu32),
            (DeviceKind::Cpu, 64) => Some(Self::Cpu64),
            (DeviceKind::Gpu, 32) => Some(Self::Gpu32),
            (DeviceKind::Gpu, 64) => Some(Self::Gpu64),
            _ => None,
        }
    }

    /// File name of the precompiled artifact.
    pub fn artifact(&self) -> &'static str {
        match self {
            Self::Cpu32 => "aes128ctr.cpu32.bc",
            Self::Cpu64 => "aes128ctr.cpu64.bc",
            Self::Gpu32 => "aes128ctr.gpu32.bc",
            Self::Gpu64 => "aes128ctr.gpu64.bc",
        }
    }

    /// Device category this variant was built for.
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Cpu32 | Self::Cpu64 => DeviceKind::Cpu,
            Self::Gpu32 | Self::Gpu64 => DeviceKind::Gpu,
        }
    }
}

/// Constants uploaded to a backend at acquisition time.
#[derive(Debug)]
pub struct BackendInit<'a> {
    /// Expanded round keys
    pub schedule: &'a KeySchedule,
    /// Session nonce
    pub nonce: &'a Nonce,
    /// Largest dispatch, in blocks, the backend must accept
    pub capacity_blocks: usize,
}

/// Device discovery and backend acquisition.
pub trait Platform {
    /// Backend type produced by [`Platform::open`]
    type Backend: ComputeBackend;

    /// Enumerate available devices in a stable order.
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Acquire every resource needed to generate keystream on `device`.
    ///
    /// On error nothing remains acquired.
    fn open(
        &self,
        device: &DeviceInfo,
        variant: KernelVariant,
        init: &BackendInit<'_>,
    ) -> Result<Self::Backend, BackendError>;
}

/// A device able to compute consecutive AES-128 CTR keystream blocks.
pub trait ComputeBackend {
    /// Largest dispatch, in blocks, accepted by [`Self::encrypt_blocks`].
    fn capacity_blocks(&self) -> usize;

    /// Write keystream blocks `start..start + out.len() / 16` into `out`.
    ///
    /// `out.len()` is a whole number of blocks no larger than
    /// [`Self::capacity_blocks`]. Blocks must be computed independently of
    /// each other and of any previous dispatch. On error the contents of
    /// `out` are unspecified.
    fn encrypt_blocks(&mut self, start: u64, out: &mut [u8]) -> Result<(), BackendError>;

    /// Wipe uploaded key material and release device resources in reverse
    /// acquisition order.
    ///
    /// Idempotent: a second call succeeds without doing anything.
    fn release(&mut self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selection_covers_cpu_and_gpu() {
        assert_eq!(KernelVariant::select(DeviceKind::Cpu, 64), Some(KernelVariant::Cpu64));
        assert_eq!(KernelVariant::select(DeviceKind::Cpu, 32), Some(KernelVariant::Cpu32));
        assert_eq!(KernelVariant::select(DeviceKind::Gpu, 64), Some(KernelVariant::Gpu64));
        assert_eq!(KernelVariant::select(DeviceKind::Gpu, 32), Some(KernelVariant::Gpu32));
    }

    #[test]
    fn accelerators_and_odd_widths_have_no_variant() {
        assert_eq!(KernelVariant::select(DeviceKind::Accelerator, 64), None);
        assert_eq!(KernelVariant::select(DeviceKind::Cpu, 16), None);
        assert_eq!(KernelVariant::select(DeviceKind::Gpu, 128), None);
    }

    #[test]
    fn artifact_names_encode_kind_and_width() {
        assert_eq!(KernelVariant::Cpu64.artifact(), "aes128ctr.cpu64.bc");
        assert_eq!(KernelVariant::Gpu32.artifact(), "aes128ctr.gpu32.bc");
        assert_eq!(KernelVariant::Gpu64.kind(), DeviceKind::Gpu);
    }
}
