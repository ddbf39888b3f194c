//! Session configuration.

use ctrflow_crypto::BLOCK_SIZE;

use crate::error::ConfigError;

/// Default ring buffer capacity in blocks (1 MiB of keystream).
pub const DEFAULT_RING_BLOCKS: usize = 1 << 16;

/// Default ceiling on blocks requested from a backend in one dispatch
/// (16 MiB of device output buffer).
pub const DEFAULT_MAX_INFLIGHT_BLOCKS: usize = 1 << 20;

/// Keystream session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Ring buffer capacity in 16-byte blocks
    pub ring_blocks: usize,
    /// Maximum blocks admitted to the backend per dispatch
    pub max_inflight_blocks: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ring_blocks: DEFAULT_RING_BLOCKS, max_inflight_blocks: DEFAULT_MAX_INFLIGHT_BLOCKS }
    }
}

impl SessionConfig {
    /// Replace the ring buffer capacity.
    #[must_use]
    pub fn with_ring_blocks(mut self, ring_blocks: usize) -> Self {
        self.ring_blocks = ring_blocks;
        self
    }

    /// Replace the per-dispatch admission ceiling.
    #[must_use]
    pub fn with_max_inflight_blocks(mut self, max_inflight_blocks: usize) -> Self {
        self.max_inflight_blocks = max_inflight_blocks;
        self
    }

    /// Ring buffer capacity in bytes.
    ///
    /// Only meaningful after [`Self::validate`] has succeeded.
    pub fn ring_bytes(&self) -> usize {
        self.ring_blocks.saturating_mul(BLOCK_SIZE)
    }

    /// Blocks the device output buffer must hold.
    ///
    /// A dispatch never exceeds either the admission ceiling or the ring
    /// capacity, so the smaller of the two suffices.
    pub fn staging_blocks(&self) -> usize {
        self.max_inflight_blocks.min(self.ring_blocks)
    }

    /// Reject configurations that could never make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_blocks == 0 {
            return Err(ConfigError::ZeroRingCapacity);
        }
        if self.max_inflight_blocks == 0 {
            return Err(ConfigError::ZeroInflightLimit);
        }
        if self.ring_blocks.checked_mul(BLOCK_SIZE).is_none() {
            return Err(ConfigError::RingTooLarge { blocks: self.ring_blocks });
        }
        Ok(())
    }
}
