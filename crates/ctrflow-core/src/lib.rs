//! ctrflow Keystream Pipeline
//!
//! Streams AES-128 CTR keystream from a compute backend through a bounded
//! ring buffer and XORs it into caller data in place.
//!
//! # Architecture
//!
//! ```text
//! caller ──► StreamSession::crypt(data)
//!                  │
//!                  ├─ ring not full? ──► CounterAdmission::grant
//!                  │                           │
//!                  │                           ▼
//!                  │              ComputeBackend::encrypt_blocks(counter..counter+grant)
//!                  │                           │
//!                  │                           ▼
//!                  │                  RingBuffer::refill (two-segment copy)
//!                  │
//!                  └─ RingBuffer::consume ──► XOR into data
//! ```
//!
//! # Components
//!
//! - [`StreamSession`]: owns key schedule, nonce, counter, ring and backend
//! - [`RingBuffer`]: circular keystream store with unwrapped cursors
//! - [`CounterAdmission`]: per-dispatch block ceiling
//! - [`backend`]: `Platform` / `ComputeBackend` traits, the portable host
//!   backend and a fault-injecting wrapper for tests
//!
//! Sessions are single-owner and synchronous: a refill blocks until the
//! backend has produced its blocks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod admission;
pub mod backend;
pub mod config;
pub mod error;
pub mod ring;
pub mod session;

pub use admission::CounterAdmission;
pub use backend::{
    BackendInit, ChaoticBackend, ChaoticPlatform, ComputeBackend, DeviceInfo, DeviceKind,
    HostBackend, HostPlatform, KernelVariant, Platform,
};
pub use config::{DEFAULT_MAX_INFLIGHT_BLOCKS, DEFAULT_RING_BLOCKS, SessionConfig};
pub use error::{BackendError, BackendOp, ConfigError, RingError, SessionError};
pub use ring::{Keystream, RingBuffer};
pub use session::{SessionState, StreamSession};
