//! Fixed-capacity ring buffer
//!
//! Keeps the most recent `capacity` samples; pushing into a full buffer evicts the
//! oldest entry first.

use std::collections::VecDeque;

/// A ring buffer that maintains a fixed maximum number of entries
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    total_pushed: u64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append a value, dropping the oldest entry when the buffer is full
    pub fn push(&mut self, value: T) {
        self.total_pushed += 1;

        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of values ever pushed (including evicted ones)
    #[must_use]
    pub const fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Check if any entry was evicted
    #[must_use]
    pub fn was_truncated(&self) -> bool {
        self.total_pushed > self.capacity as u64
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Drop all retained entries and reset the push counter
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.total_pushed = 0;
    }
}

impl<T: Copy + Ord> RingBuffer<T> {
    /// Copy of the retained entries in ascending order
    #[must_use]
    pub fn sorted(&self) -> Vec<T> {
        let mut values: Vec<T> = self.buffer.iter().copied().collect();
        values.sort_unstable();
        values
    }
}
