//! Fixed-capacity byte FIFO between the player and the render callback.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use crate::OutputError;

/// A bounded byte FIFO for interleaved PCM data.
///
/// This wraps a heap ring buffer and exposes it through bounds-checked
/// slices instead of raw pointer ranges. The buffer itself does no
/// locking: the owning sink serializes every call pair (`write`,
/// `read`/`consume`, `clear`) under one mutex.
///
/// Reads hand out the largest *contiguous* occupied region. When the
/// unread data wraps past the end of the storage, [`read`](Self::read)
/// returns the part up to the end and the caller re-requests after
/// consuming it.
pub struct RingBuffer {
    rb: HeapRb<u8>,
}

impl RingBuffer {
    /// Allocates a buffer holding exactly `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Allocation`] if `capacity` is zero or the
    /// storage cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self, OutputError> {
        if capacity == 0 {
            return Err(OutputError::Allocation { bytes: 0 });
        }

        let rb = HeapRb::try_new(capacity)
            .map_err(|_| OutputError::Allocation { bytes: capacity })?;
        Ok(Self { rb })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.rb.capacity().get()
    }

    /// Number of bytes written but not yet consumed.
    pub fn used(&self) -> usize {
        self.rb.occupied_len()
    }

    /// Number of bytes that can still be written.
    pub fn free(&self) -> usize {
        self.rb.vacant_len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    /// Returns `true` if no more bytes can be written.
    pub fn is_full(&self) -> bool {
        self.rb.is_full()
    }

    /// Copies as much of `data` as fits and commits it.
    ///
    /// Returns the number of bytes accepted, which is
    /// `min(data.len(), self.free())`. Zero means the buffer is full.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.rb.push_slice(data)
    }

    /// Returns the largest contiguous run of unread bytes.
    ///
    /// The returned slice never exceeds [`used`](Self::used) and may be
    /// shorter when the data wraps.
    pub fn read(&self) -> &[u8] {
        self.rb.as_slices().0
    }

    /// Discards `n` bytes from the front of the buffer.
    ///
    /// `n` is bounded internally by the length of the current
    /// [`read`](Self::read) range. Returns the number of bytes discarded.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.read().len());
        self.rb.skip(n)
    }

    /// Discards all buffered data and moves both cursors back to the
    /// start of the storage.
    ///
    /// Returns the number of bytes that were dropped. A capacity that is a
    /// whole number of frames keeps later reads frame-aligned, even if the
    /// last write ended mid-frame.
    pub fn clear(&mut self) -> usize {
        let discarded = self.rb.clear();

        let offset = self.rb.read_index() % self.capacity();
        if offset != 0 {
            let pad = self.capacity() - offset;
            self.rb.push_iter(std::iter::repeat(0).take(pad));
            self.rb.skip(pad);
        }

        discarded
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}
