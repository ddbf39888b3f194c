//! Keystream session
//!
//! A [`StreamSession`] owns one (key, nonce) pair for its whole life. It keeps
//! a ring of precomputed keystream topped up from a [`ComputeBackend`] and
//! XORs caller buffers against it in place. Encryption and decryption are the
//! same operation.
//!
//! # State Machine
//!
//! ```text
//! open ──► Ready ──crypt──► Refilling ⇄ Consuming ──► Ready
//!            │
//!            └──close / drop──► Destroyed
//! ```
//!
//! Any acquisition failure inside [`StreamSession::open`] returns an error and
//! no session exists. A dispatch failure inside [`StreamSession::crypt`]
//! returns to `Ready`.
//!
//! # Counter Accounting
//!
//! `counter` is the index of the next block not yet requested from the
//! backend. At every observable point:
//!
//! ```text
//! counter * 16 == consumed bytes (whole blocks) + buffered bytes
//! ```
//!
//! The counter only advances after a dispatch succeeds, so a failed dispatch
//! never skips or replays a counter range.

use std::fmt;

use ctrflow_crypto::{BLOCK_SIZE, Key, KeySchedule, Nonce, expand};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::{
    admission::CounterAdmission,
    backend::{BackendInit, ComputeBackend, DeviceInfo, KernelVariant, Platform, status},
    config::SessionConfig,
    error::{BackendError, BackendOp, RingError, SessionError},
    ring::RingBuffer,
};

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Idle, accepting `crypt` calls
    Ready,
    /// Waiting on a backend dispatch
    Refilling,
    /// XORing buffered keystream into caller data
    Consuming,
    /// Key material wiped and backend released
    Destroyed,
}

/// An AES-128 CTR keystream session over one compute backend.
pub struct StreamSession<B: ComputeBackend> {
    schedule: KeySchedule,
    nonce: Nonce,
    /// Next counter block not yet requested from the backend
    counter: u64,
    /// Blocks handed to callers, unaffected by wiping the ring
    consumed: u64,
    ring: RingBuffer,
    /// Host copy of the device output buffer
    staging: Vec<u8>,
    admission: CounterAdmission,
    /// `None` once torn down
    backend: Option<B>,
    state: SessionState,
    config: SessionConfig,
    device: DeviceInfo,
    variant: KernelVariant,
}

impl<B: ComputeBackend> StreamSession<B> {
    /// Open a session on device `device_index` of `platform`.
    ///
    /// Validates `config`, selects the kernel variant for the device, expands
    /// the key and acquires backend resources. `key` is zeroed before this
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Config`] for an unusable configuration
    /// - [`SessionError::DeviceNotFound`] if `device_index` is out of range
    /// - [`SessionError::NoKernelVariant`] if no artifact matches the device
    /// - [`SessionError::Allocation`] if host buffers cannot be allocated
    /// - [`SessionError::Acquisition`] if any backend acquisition step fails
    pub fn open<P>(
        platform: &P,
        device_index: usize,
        key: Key,
        nonce: Nonce,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        P: Platform<Backend = B>,
    {
        config.validate()?;

        let mut devices = platform.devices().map_err(SessionError::Acquisition)?;
        let available = devices.len();
        if device_index >= available {
            return Err(SessionError::DeviceNotFound { index: device_index, available });
        }
        let device = devices.swap_remove(device_index);

        let variant = KernelVariant::select(device.kind, device.address_bits).ok_or(
            SessionError::NoKernelVariant { kind: device.kind, address_bits: device.address_bits },
        )?;

        let schedule = expand(&key);
        drop(key);

        let ring = RingBuffer::try_with_blocks(config.ring_blocks)?;
        let staging_blocks = config.staging_blocks();
        let staging = allocate_zeroed(staging_blocks * BLOCK_SIZE)?;

        let init = BackendInit { schedule: &schedule, nonce: &nonce, capacity_blocks: staging_blocks };
        let mut backend = platform.open(&device, variant, &init).map_err(SessionError::Acquisition)?;

        let dispatch_blocks = staging_blocks.min(backend.capacity_blocks());
        if dispatch_blocks == 0 {
            if let Err(err) = backend.release() {
                warn!(error = %err, "failed to release backend after rejecting it");
            }
            return Err(SessionError::Acquisition(BackendError::new(
                BackendOp::AllocateBuffer,
                status::INVALID_BUFFER_SIZE,
            )));
        }

        info!(
            device = %device.name,
            index = device.index,
            artifact = variant.artifact(),
            ring_blocks = config.ring_blocks,
            max_inflight_blocks = dispatch_blocks,
            "session opened"
        );

        Ok(Self {
            schedule,
            nonce,
            counter: 0,
            consumed: 0,
            ring,
            staging,
            admission: CounterAdmission::new(dispatch_blocks),
            backend: Some(backend),
            state: SessionState::Ready,
            config,
            device,
            variant,
        })
    }

    /// XOR `data` in place with the next `data.len()` bytes of keystream.
    ///
    /// Whole blocks are drawn from the ring, refilling it whenever it is not
    /// full. A trailing partial block uses the head of one keystream block
    /// and discards the rest of it. Returns the number of bytes transformed,
    /// always `data.len()` on success.
    ///
    /// # Errors
    ///
    /// [`SessionError::Dispatch`] if a backend dispatch fails. The first
    /// `processed` bytes of `data` are transformed, the rest are untouched,
    /// and the session stays usable: calling `crypt` on `data[processed..]`
    /// continues the keystream where it stopped.
    pub fn crypt(&mut self, data: &mut [u8]) -> Result<usize, SessionError> {
        let result = self.crypt_inner(data);
        self.state = SessionState::Ready;
        result
    }

    fn crypt_inner(&mut self, data: &mut [u8]) -> Result<usize, SessionError> {
        let whole = data.len() - data.len() % BLOCK_SIZE;
        let mut processed = 0;

        while processed < whole {
            if !self.ring.is_full() {
                self.fill_ring().map_err(|err| with_progress(err, processed))?;
            }

            let blocks = ((whole - processed) / BLOCK_SIZE).min(self.ring.len() / BLOCK_SIZE);
            if blocks == 0 {
                return Err(RingError::Underflow { requested: BLOCK_SIZE, available: self.ring.len() }
                    .into());
            }

            self.state = SessionState::Consuming;
            let bytes = blocks * BLOCK_SIZE;
            self.ring.consume(bytes)?.xor_into(&mut data[processed..processed + bytes]);
            self.consumed += blocks as u64;
            processed += bytes;
        }

        let remainder = data.len() - whole;
        if remainder > 0 {
            if self.ring.is_empty() {
                self.refill_once().map_err(|err| with_progress(err, processed))?;
            }

            self.state = SessionState::Consuming;
            self.ring.consume(BLOCK_SIZE)?.xor_into(&mut data[whole..]);
            self.consumed += 1;
            processed += remainder;
        }

        Ok(processed)
    }

    /// Refill until the ring is full or admission grants nothing.
    fn fill_ring(&mut self) -> Result<(), SessionError> {
        while !self.ring.is_full() {
            if self.refill_once()? == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Run one admission-bounded dispatch and append its output to the ring.
    ///
    /// Returns the number of blocks granted, zero when the ring is full.
    ///
    /// # Errors
    ///
    /// [`SessionError::Dispatch`] (with `processed == 0`) if the backend
    /// fails; the counter and ring are unchanged.
    pub fn refill(&mut self) -> Result<usize, SessionError> {
        let result = self.refill_once();
        self.state = SessionState::Ready;
        result
    }

    fn refill_once(&mut self) -> Result<usize, SessionError> {
        let free_blocks = self.ring.free_space() / BLOCK_SIZE;
        let grant = self.admission.grant(free_blocks, free_blocks);
        if grant == 0 {
            return Ok(0);
        }

        let Some(backend) = self.backend.as_mut() else {
            return Err(SessionError::Acquisition(BackendError::new(
                BackendOp::Dispatch,
                status::INVALID_KERNEL,
            )));
        };

        self.state = SessionState::Refilling;
        let bytes = grant * BLOCK_SIZE;
        let staging = &mut self.staging[..bytes];

        if let Err(source) = backend.encrypt_blocks(self.counter, staging) {
            warn!(counter = self.counter, blocks = grant, error = %source, "dispatch failed");
            return Err(SessionError::Dispatch { source, processed: 0 });
        }

        self.ring.refill(staging)?;
        staging.zeroize();
        self.counter = self.counter.wrapping_add(grant as u64);

        debug!(counter = self.counter, blocks = grant, buffered = self.ring.len(), "ring refilled");
        Ok(grant)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Index of the next block not yet requested from the backend.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Keystream bytes buffered in the ring.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Keystream blocks consumed so far, partial tails included.
    pub fn consumed_blocks(&self) -> u64 {
        self.consumed
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Device the session runs on.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Kernel variant selected for the device.
    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    /// Wipe key material and release the backend.
    ///
    /// # Errors
    ///
    /// [`SessionError::Teardown`] if the backend fails to release. Host-side
    /// key material is wiped regardless.
    pub fn close(mut self) -> Result<(), SessionError> {
        self.teardown().map_err(SessionError::Teardown)
    }

    fn teardown(&mut self) -> Result<(), BackendError> {
        let discarded_blocks = self.ring.len() / BLOCK_SIZE;
        self.schedule.wipe();
        self.nonce.zeroize();
        self.ring.wipe();
        self.staging.as_mut_slice().zeroize();

        let result = match self.backend.take() {
            Some(mut backend) => backend.release(),
            None => Ok(()),
        };
        self.state = SessionState::Destroyed;

        info!(
            counter = self.counter,
            consumed_blocks = self.consumed,
            discarded_blocks,
            "session closed"
        );
        result
    }
}

impl<B: ComputeBackend> Drop for StreamSession<B> {
    fn drop(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        if let Err(err) = self.teardown() {
            warn!(error = %err, "backend release failed during drop");
        }
    }
}

impl<B: ComputeBackend> fmt::Debug for StreamSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.state)
            .field("counter", &self.counter)
            .field("ring", &self.ring)
            .field("device", &self.device.name)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

fn allocate_zeroed(bytes: usize) -> Result<Vec<u8>, SessionError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes).map_err(|_| SessionError::Allocation { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}

fn with_progress(err: SessionError, processed: usize) -> SessionError {
    match err {
        SessionError::Dispatch { source, .. } => SessionError::Dispatch { source, processed },
        other => other,
    }
}
