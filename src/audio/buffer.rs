//! Fixed-capacity circular (ring) buffer.
//!
//! When the buffer is full, new values **overwrite** the oldest entry so the
//! most recent `capacity` values are always available.  The breathing
//! detector keeps its smoothed-volume history in one of these.
//!
//! # Example
//!
//! ```rust
//! use breath_flap::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     buf.push(v); // 5 items → capacity 4 → oldest dropped
//! }
//! assert_eq!(buf.recent(2).collect::<Vec<_>>(), vec![4.0, 5.0]);
//! assert_eq!(buf.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer of `Copy` values.
///
/// ## Overflow behaviour
///
/// Pushing beyond `capacity` silently overwrites the oldest value.  The
/// buffer never allocates beyond its initial capacity.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid values currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append a single value, evicting the oldest one when full.
    pub fn push(&mut self, item: T) {
        self.buf[self.write_pos] = item;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Position of the oldest stored value inside `buf`.
    fn read_pos(&self) -> usize {
        if self.len < self.capacity {
            0
        } else {
            self.write_pos
        }
    }

    /// Iterate over the stored values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = self.read_pos();
        (0..self.len).map(move |i| self.buf[(start + i) % self.capacity])
    }

    /// The `n` most recent values, oldest first.  Yields fewer than `n`
    /// values when the buffer holds fewer.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = T> + '_ {
        self.iter().skip(self.len.saturating_sub(n))
    }

    /// The most recently pushed value.
    pub fn last(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        Some(self.buf[idx])
    }

    /// Discard all values and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid values currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
