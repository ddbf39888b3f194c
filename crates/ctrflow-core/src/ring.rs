//! Circular keystream store.
//!
//! Logical cursors `read` and `write` only ever increase; the physical offset
//! of a cursor is `cursor % size`. The number of buffered bytes is
//! `write - read`, so there is no ambiguity between an empty and a full ring.
//!
//! ```text
//!   physical:  0                                   size
//!              ├──────────┬─────────────────┬───────┤
//!              │ tail of  │      free       │ head  │
//!              │ buffered │                 │       │
//!              └──────────┴─────────────────┴───────┘
//!                         ^ write % size    ^ read % size
//! ```
//!
//! # Invariants
//!
//! - `0 <= len() <= size()`
//! - The `len()` bytes starting at `read % size` (wrapping) are the keystream
//!   for blocks `read / 16 ..` in order, none of them consumed yet

use ctrflow_crypto::BLOCK_SIZE;
use zeroize::Zeroize;

use crate::error::{ConfigError, RingError, SessionError};

/// Fixed-capacity circular buffer of generated keystream.
pub struct RingBuffer {
    storage: Vec<u8>,
    read: u64,
    write: u64,
}

impl RingBuffer {
    /// Create a ring holding `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or not a multiple of the block size.
    pub fn new(size: usize) -> Self {
        assert!(
            size > 0 && size.is_multiple_of(BLOCK_SIZE),
            "ring size must be a non-zero multiple of {BLOCK_SIZE}, got {size}"
        );
        Self { storage: vec![0u8; size], read: 0, write: 0 }
    }

    /// Create a ring holding `blocks` keystream blocks, reporting allocation
    /// failure instead of aborting.
    pub fn try_with_blocks(blocks: usize) -> Result<Self, SessionError> {
        if blocks == 0 {
            return Err(ConfigError::ZeroRingCapacity.into());
        }
        let bytes =
            blocks.checked_mul(BLOCK_SIZE).ok_or(ConfigError::RingTooLarge { blocks })?;

        let mut storage = Vec::new();
        storage.try_reserve_exact(bytes).map_err(|_| SessionError::Allocation { bytes })?;
        storage.resize(bytes, 0);

        Ok(Self { storage, read: 0, write: 0 })
    }

    /// Total capacity in bytes.
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Buffered, unconsumed bytes.
    pub fn len(&self) -> usize {
        (self.write - self.read) as usize
    }

    /// True if no keystream is buffered.
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// True if no more keystream fits.
    pub fn is_full(&self) -> bool {
        self.len() == self.size()
    }

    /// Bytes that can be appended before the ring is full.
    pub fn free_space(&self) -> usize {
        self.size() - self.len()
    }

    /// Logical (unwrapped) read cursor: total bytes ever consumed.
    pub fn read_position(&self) -> u64 {
        self.read
    }

    /// Logical (unwrapped) write cursor: total bytes ever appended.
    pub fn write_position(&self) -> u64 {
        self.write
    }

    /// Append keystream at the write cursor.
    ///
    /// An append that crosses the physical end is split into two copies: the
    /// segment up to the end, then the remainder from offset zero.
    pub fn refill(&mut self, bytes: &[u8]) -> Result<(), RingError> {
        let free = self.free_space();
        if bytes.len() > free {
            return Err(RingError::Overflow { requested: bytes.len(), free });
        }

        let start = self.offset(self.write);
        let first = bytes.len().min(self.size() - start);
        let (head, tail) = bytes.split_at(first);

        self.storage[start..start + first].copy_from_slice(head);
        self.storage[..tail.len()].copy_from_slice(tail);

        self.write += bytes.len() as u64;
        Ok(())
    }

    /// Consume `n` bytes at the read cursor and expose them for XOR.
    ///
    /// The bytes count as consumed as soon as this returns; the view borrows
    /// the ring so nothing can overwrite them while it is alive.
    pub fn consume(&mut self, n: usize) -> Result<Keystream<'_>, RingError> {
        let available = self.len();
        if n > available {
            return Err(RingError::Underflow { requested: n, available });
        }

        let start = self.offset(self.read);
        let first = n.min(self.size() - start);
        self.read += n as u64;

        Ok(Keystream { head: &self.storage[start..start + first], tail: &self.storage[..n - first] })
    }

    /// Zero the backing store and drop any buffered keystream.
    ///
    /// Cursors keep their logical positions so counter accounting survives.
    pub fn wipe(&mut self) {
        self.storage.as_mut_slice().zeroize();
        self.read = self.write;
    }

    fn offset(&self, cursor: u64) -> usize {
        (cursor % self.storage.len() as u64) as usize
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("size", &self.size())
            .field("read", &self.read)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        self.storage.zeroize();
    }
}

/// Consumed keystream, possibly split across the physical end of the ring.
#[derive(Debug, Clone, Copy)]
pub struct Keystream<'a> {
    head: &'a [u8],
    tail: &'a [u8],
}

impl Keystream<'_> {
    /// Number of keystream bytes in the view.
    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    /// True if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// XOR the head of the view into `data`.
    ///
    /// Applies `min(data.len(), self.len())` bytes; surplus keystream is
    /// discarded.
    pub fn xor_into(&self, data: &mut [u8]) {
        let split = data.len().min(self.head.len());
        let (data_head, data_tail) = data.split_at_mut(split);
        xor_in_place(data_head, self.head);
        xor_in_place(data_tail, self.tail);
    }

    /// Copy the view into a contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.head);
        out.extend_from_slice(self.tail);
        out
    }
}

fn xor_in_place(data: &mut [u8], keystream: &[u8]) {
    for (byte, key) in data.iter_mut().zip(keystream) {
        *byte ^= key;
    }
}
