//! Chaotic platform wrapper for fault injection testing
//!
//! Wraps another platform and fails chosen calls: one acquisition step, a
//! specific dispatch, or dispatches at random with a seeded rate. Used to
//! check that sessions surface partial progress correctly and never leak
//! resources on failure.

use std::sync::{Arc, Mutex};

use super::{BackendInit, ComputeBackend, DeviceInfo, KernelVariant, Platform, status};
use crate::error::{BackendError, BackendOp};

/// Fault-injecting platform wrapper
///
/// Counters are shared with every backend it opens, so they stay readable
/// after the backend has moved into a session.
#[derive(Clone)]
pub struct ChaoticPlatform<P: Platform> {
    inner: P,
    /// Probability that any dispatch fails (0.0 = never, 1.0 = always)
    failure_rate: f64,
    /// Acquisition step to fail, if any
    fail_open: Option<BackendOp>,
    /// Zero-based dispatch attempt to fail, if any
    fail_dispatch: Option<usize>,
    state: Arc<Mutex<ChaosState>>,
}

#[derive(Debug, Default)]
struct ChaosState {
    rng: ChaoticRng,
    dispatch_attempts: usize,
    injected_failures: usize,
    blocks_generated: u64,
    releases: usize,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator, so a seed reproduces the same failures.
#[derive(Debug)]
struct ChaoticRng {
    state: u64,
}

impl Default for ChaoticRng {
    fn default() -> Self {
        Self::new(0x1234_5678_9ABC_DEF0)
    }
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        failure_rate > 0.0 && self.next() < failure_rate
    }
}

impl<P: Platform> ChaoticPlatform<P> {
    /// Wrap `inner` without injecting any failure yet.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            failure_rate: 0.0,
            fail_open: None,
            fail_dispatch: None,
            state: Arc::new(Mutex::new(ChaosState::default())),
        }
    }

    /// Fail dispatches at random with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[must_use]
    pub fn with_failure_rate(mut self, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );
        self.failure_rate = failure_rate;
        self.lock().rng = ChaoticRng::new(seed);
        self
    }

    /// Fail the acquisition step `op`.
    ///
    /// [`BackendOp::EnumerateDevices`] fails [`Platform::devices`]; any other
    /// step fails [`Platform::open`] before the inner platform is touched.
    #[must_use]
    pub fn failing_open_at(mut self, op: BackendOp) -> Self {
        self.fail_open = Some(op);
        self
    }

    /// Fail the `attempt`-th dispatch (zero-based) of any backend opened
    /// through this platform.
    #[must_use]
    pub fn failing_dispatch(mut self, attempt: usize) -> Self {
        self.fail_dispatch = Some(attempt);
        self
    }

    /// Underlying platform.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Dispatches attempted, failed ones included.
    pub fn dispatch_attempts(&self) -> usize {
        self.lock().dispatch_attempts
    }

    /// Failures injected so far.
    pub fn injected_failures(&self) -> usize {
        self.lock().injected_failures
    }

    /// Keystream blocks produced by successful dispatches.
    pub fn blocks_generated(&self) -> u64 {
        self.lock().blocks_generated
    }

    /// Backends released so far.
    pub fn releases(&self) -> usize {
        self.lock().releases
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChaosState> {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("ChaosState mutex poisoned")
    }

    fn injected(&self, op: BackendOp) -> BackendError {
        self.lock().injected_failures += 1;
        BackendError::new(op, status::INJECTED_FAILURE)
    }
}

impl<P: Platform> Platform for ChaoticPlatform<P> {
    type Backend = ChaoticBackend<P::Backend>;

    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        if self.fail_open == Some(BackendOp::EnumerateDevices) {
            return Err(self.injected(BackendOp::EnumerateDevices));
        }
        self.inner.devices()
    }

    fn open(
        &self,
        device: &DeviceInfo,
        variant: KernelVariant,
        init: &BackendInit<'_>,
    ) -> Result<Self::Backend, BackendError> {
        if let Some(op) = self.fail_open.filter(|op| *op != BackendOp::EnumerateDevices) {
            return Err(self.injected(op));
        }

        let inner = self.inner.open(device, variant, init)?;
        Ok(ChaoticBackend {
            inner,
            failure_rate: self.failure_rate,
            fail_dispatch: self.fail_dispatch,
            released: false,
            state: Arc::clone(&self.state),
        })
    }
}

/// Backend opened through a [`ChaoticPlatform`].
pub struct ChaoticBackend<B> {
    inner: B,
    failure_rate: f64,
    fail_dispatch: Option<usize>,
    released: bool,
    state: Arc<Mutex<ChaosState>>,
}

impl<B> ChaoticBackend<B> {
    /// Underlying backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChaosState> {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("ChaosState mutex poisoned")
    }
}

impl<B: ComputeBackend> ComputeBackend for ChaoticBackend<B> {
    fn capacity_blocks(&self) -> usize {
        self.inner.capacity_blocks()
    }

    fn encrypt_blocks(&mut self, start: u64, out: &mut [u8]) -> Result<(), BackendError> {
        {
            let failure_rate = self.failure_rate;
            let fail_dispatch = self.fail_dispatch;
            let mut state = self.lock();
            let attempt = state.dispatch_attempts;
            state.dispatch_attempts += 1;

            if fail_dispatch == Some(attempt) || state.rng.should_fail(failure_rate) {
                state.injected_failures += 1;
                return Err(BackendError::new(BackendOp::Dispatch, status::INJECTED_FAILURE));
            }
        }

        self.inner.encrypt_blocks(start, out)?;
        self.lock().blocks_generated += (out.len() / ctrflow_crypto::BLOCK_SIZE) as u64;
        Ok(())
    }

    fn release(&mut self) -> Result<(), BackendError> {
        self.inner.release()?;
        if !self.released {
            self.released = true;
            self.lock().releases += 1;
        }
        Ok(())
    }
}
