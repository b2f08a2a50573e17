//! Fixed-Size Circular Buffer for Recent Distance History
//!
//! ## Overview
//!
//! The tracker keeps a handful of recently accepted distances per hypothesis and
//! compares each new reading against their median. A ring buffer with a capacity
//! fixed at compile time fits that job exactly:
//!
//! - O(1) insertion, overwriting the oldest entry when full
//! - O(1) access to the most recent entry
//! - no heap allocation for storage
//!
//! ### Memory Layout
//!
//! ```text
//! CircularBuffer<f64, 5>:
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  0  │  1  │  2  │  3  │  4  │  ← Array indices
//! └─────┴─────┴─────┴─────┴─────┘
//!    ↑                       ↑
//!    └── write_pos = 0      └── After 5 writes, wraps here
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use rangefinder_core::buffer::CircularBuffer;
//!
//! let mut recent: CircularBuffer<f64, 5> = CircularBuffer::new();
//! for d in [20.0, 21.0, 19.5, 20.5] {
//!     recent.push(d);
//! }
//! assert_eq!(recent.median(), Some(20.25));
//! ```

/// Fixed-size circular buffer
///
/// ## Internal Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - Iteration yields items oldest to newest
///
/// Not thread-safe; each owner (one tracker hypothesis) drives it from a single
/// frame sequence.
#[derive(Clone, Debug)]
pub struct CircularBuffer<T: Copy, const N: usize> {
    /// Storage, `None` for never-written slots
    data: [Option<T>; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid items
    len: usize,
}

impl<T: Copy, const N: usize> CircularBuffer<T, N> {
    /// Creates a new empty circular buffer
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds an item, overwriting the oldest one when full
    pub fn push(&mut self, item: T) {
        self.data[self.write_pos] = Some(item);
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Capacity fixed at compile time
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most recent item
    pub fn last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        self.data[idx].as_ref()
    }

    /// Iterate over items from oldest to newest
    pub fn iter(&self) -> CircularBufferIter<'_, T, N> {
        CircularBufferIter {
            buffer: self,
            index: 0,
        }
    }

    /// Drop every stored item
    pub fn clear(&mut self) {
        self.data = [None; N];
        self.write_pos = 0;
        self.len = 0;
    }

    /// Gets an item by logical index (0 = oldest)
    ///
    /// ```text
    /// Physical array:  [D, E, A, B, C]  (write_pos = 2)
    /// Logical view:    [A, B, C, D, E]
    /// logical[i] = physical[(write_pos + i) % N] once full
    /// ```
    fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < N {
            index
        } else {
            (self.write_pos + index) % N
        };

        self.data[actual_index].as_ref()
    }
}

impl<const N: usize> CircularBuffer<f64, N> {
    /// Median of the stored values (mean of the middle pair for even counts)
    pub fn median(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let mut values: heapless::Vec<f64, N> = self.iter().copied().collect();
        values.sort_unstable_by(|a, b| a.total_cmp(b));

        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) * 0.5)
        } else {
            Some(values[mid])
        }
    }
}

/// Iterator over circular buffer contents
pub struct CircularBufferIter<'a, T: Copy, const N: usize> {
    buffer: &'a CircularBuffer<T, N>,
    index: usize,
}

impl<'a, T: Copy, const N: usize> Iterator for CircularBufferIter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.buffer.get(self.index)?;
        self.index += 1;
        Some(item)
    }
}

impl<T: Copy, const N: usize> Default for CircularBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer: CircularBuffer<f64, 5> = CircularBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert!(buffer.median().is_none());
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = CircularBuffer::<f64, 3>::new();

        for i in 0..5 {
            buffer.push(i as f64);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        // 0 and 1 were overwritten
        let values: Vec<f64> = buffer.iter().copied().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.last(), Some(&4.0));
    }

    #[test]
    fn median_odd_and_even() {
        let mut buffer = CircularBuffer::<f64, 5>::new();
        buffer.push(30.0);
        buffer.push(10.0);
        buffer.push(20.0);
        assert_eq!(buffer.median(), Some(20.0));

        buffer.push(40.0);
        assert_eq!(buffer.median(), Some(25.0));
    }

    #[test]
    fn median_after_wrap_ignores_evicted() {
        let mut buffer = CircularBuffer::<f64, 5>::new();
        buffer.push(1000.0);
        for _ in 0..5 {
            buffer.push(20.0);
        }
        assert_eq!(buffer.median(), Some(20.0));
    }

    #[test]
    fn clear_resets() {
        let mut buffer = CircularBuffer::<f64, 5>::new();
        buffer.push(1.0);
        buffer.push(2.0);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);

        buffer.push(3.0);
        assert_eq!(buffer.last(), Some(&3.0));
    }
}
