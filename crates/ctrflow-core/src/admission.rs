//! Admission control for backend dispatches.
//!
//! Bounds how many keystream blocks one dispatch may materialise. The ceiling
//! protects device memory and queue limits; the ring's free space bounds the
//! grant from the host side. Small ceilings trade dispatch overhead for a
//! smaller device footprint.

/// Per-dispatch block admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdmission {
    max_inflight: usize,
}

impl CounterAdmission {
    /// Create an admission policy with the given per-dispatch ceiling.
    pub fn new(max_inflight: usize) -> Self {
        Self { max_inflight }
    }

    /// Configured per-dispatch ceiling in blocks.
    pub fn max_inflight(&self) -> usize {
        self.max_inflight
    }

    /// Blocks to dispatch for a refill that wants `want` blocks while the ring
    /// has `free_blocks` free slots.
    ///
    /// # Invariants
    ///
    /// - `grant <= max_inflight`
    /// - `grant <= want`
    /// - `grant <= free_blocks`
    pub fn grant(&self, want: usize, free_blocks: usize) -> usize {
        self.max_inflight.min(want).min(free_blocks)
    }
}
