//! Portable host backend
//!
//! Runs the block kernel from `ctrflow-crypto` on the calling thread. It
//! walks the same acquisition steps a device runtime would and keeps a log of
//! them, so teardown ordering can be checked without real hardware.

use ctrflow_crypto::{BLOCK_SIZE, KeySchedule, Nonce, fill_keystream};
use tracing::debug;
use zeroize::Zeroize;

use super::{BackendInit, ComputeBackend, DeviceInfo, DeviceKind, KernelVariant, Platform, status};
use crate::error::{BackendError, BackendOp};

/// A platform exposing the host CPU as device 0.
#[derive(Debug, Clone)]
pub struct HostPlatform {
    devices: Vec<DeviceInfo>,
}

impl HostPlatform {
    /// The host processor as a single CPU device.
    pub fn new() -> Self {
        Self {
            devices: vec![DeviceInfo {
                index: 0,
                name: "host".to_string(),
                kind: DeviceKind::Cpu,
                address_bits: usize::BITS,
            }],
        }
    }

    /// A platform reporting an arbitrary device list.
    ///
    /// Only CPU entries can actually be opened; others fail context creation
    /// the way a missing driver would.
    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self { devices }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HostPlatform {
    type Backend = HostBackend;

    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        device: &DeviceInfo,
        variant: KernelVariant,
        init: &BackendInit<'_>,
    ) -> Result<HostBackend, BackendError> {
        if !self.devices.contains(device) {
            return Err(BackendError::new(BackendOp::CreateContext, status::INVALID_DEVICE));
        }
        if device.kind != DeviceKind::Cpu {
            return Err(BackendError::new(BackendOp::CreateContext, status::DEVICE_NOT_AVAILABLE));
        }

        let mut acquired = vec![BackendOp::CreateContext, BackendOp::CreateQueue];

        if variant.kind() != DeviceKind::Cpu {
            return Err(BackendError::new(BackendOp::BuildProgram, status::INVALID_VALUE));
        }
        acquired.extend([BackendOp::BuildProgram, BackendOp::CreateKernel]);

        if init.capacity_blocks == 0 {
            return Err(BackendError::new(BackendOp::AllocateBuffer, status::INVALID_BUFFER_SIZE));
        }
        let bytes = init
            .capacity_blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or(BackendError::new(BackendOp::AllocateBuffer, status::OUT_OF_RESOURCES))?;
        let mut output = Vec::new();
        output
            .try_reserve_exact(bytes)
            .map_err(|_| BackendError::new(BackendOp::AllocateBuffer, status::OUT_OF_RESOURCES))?;
        output.resize(bytes, 0);
        acquired.push(BackendOp::AllocateBuffer);

        let schedule = init.schedule.clone();
        let nonce = init.nonce.clone();
        acquired.push(BackendOp::UploadConstants);

        debug!(
            device = %device.name,
            artifact = variant.artifact(),
            capacity_blocks = init.capacity_blocks,
            "host backend acquired"
        );

        Ok(HostBackend {
            schedule,
            nonce,
            output,
            capacity_blocks: init.capacity_blocks,
            acquired,
            released: Vec::new(),
            dispatches: 0,
        })
    }
}

/// Host-side keystream generator.
pub struct HostBackend {
    schedule: KeySchedule,
    nonce: Nonce,
    /// Reused output buffer, `capacity_blocks * 16` bytes
    output: Vec<u8>,
    capacity_blocks: usize,
    /// Resources currently held, in acquisition order
    acquired: Vec<BackendOp>,
    /// Resources released so far, in release order
    released: Vec<BackendOp>,
    dispatches: usize,
}

impl HostBackend {
    /// Resources currently held, in acquisition order.
    pub fn acquired(&self) -> &[BackendOp] {
        &self.acquired
    }

    /// Resources released so far, in release order.
    pub fn released(&self) -> &[BackendOp] {
        &self.released
    }

    /// True once [`ComputeBackend::release`] has run.
    pub fn is_released(&self) -> bool {
        self.acquired.is_empty()
    }

    /// Successful dispatches so far.
    pub fn dispatches(&self) -> usize {
        self.dispatches
    }
}

impl ComputeBackend for HostBackend {
    fn capacity_blocks(&self) -> usize {
        self.capacity_blocks
    }

    fn encrypt_blocks(&mut self, start: u64, out: &mut [u8]) -> Result<(), BackendError> {
        if self.is_released() {
            return Err(BackendError::new(BackendOp::Dispatch, status::INVALID_KERNEL));
        }
        if !out.len().is_multiple_of(BLOCK_SIZE) {
            return Err(BackendError::new(BackendOp::Dispatch, status::INVALID_VALUE));
        }
        if out.len() > self.output.len() {
            return Err(BackendError::new(BackendOp::Dispatch, status::INVALID_BUFFER_SIZE));
        }

        let device = &mut self.output[..out.len()];
        fill_keystream(&self.schedule, &self.nonce, start, device)
            .map_err(|_| BackendError::new(BackendOp::Dispatch, status::INVALID_VALUE))?;

        out.copy_from_slice(device);
        self.dispatches += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), BackendError> {
        if self.is_released() {
            return Ok(());
        }

        self.schedule.wipe();
        self.nonce.zeroize();
        self.output.as_mut_slice().zeroize();

        while let Some(op) = self.acquired.pop() {
            self.released.push(op);
        }

        debug!(dispatches = self.dispatches, "host backend released");
        Ok(())
    }
}

impl std::fmt::Debug for HostBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBackend")
            .field("capacity_blocks", &self.capacity_blocks)
            .field("acquired", &self.acquired)
            .field("dispatches", &self.dispatches)
            .finish_non_exhaustive()
    }
}
