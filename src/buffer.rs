use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A fixed-capacity window over the most recently pushed values.
///
/// When the window is full, pushing discards the oldest value. Reads go through
/// [`SlidingWindowBuffer::drain`], which hands back an owned snapshot and
/// empties the window in one step. Cloning yields another handle to the same
/// window.
#[derive(Debug)]
pub struct SlidingWindowBuffer {
    values: Arc<Mutex<VecDeque<i64>>>,
    capacity: usize,
    evicted_count: Arc<AtomicU64>,
}

impl Clone for SlidingWindowBuffer {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
            capacity: self.capacity,
            evicted_count: Arc::clone(&self.evicted_count),
        }
    }
}

impl SlidingWindowBuffer {
    /// Create a new window holding at most `capacity` values
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::ConfigError(
                "sliding window capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            values: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            evicted_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Append a value, evicting the oldest one if the window is full
    pub fn push(&self, value: i64) {
        let mut values = self.values.lock();
        if values.len() == self.capacity {
            values.pop_front();
            self.evicted_count.fetch_add(1, Ordering::Relaxed);
        }
        values.push_back(value);
    }

    /// Take every held value, oldest first, leaving the window empty.
    ///
    /// Returns `None` if nothing was pushed since creation or the last drain.
    pub fn drain(&self) -> Option<Vec<i64>> {
        let mut values = self.values.lock();
        if values.is_empty() {
            return None;
        }
        Some(values.drain(..).collect())
    }

    /// Get the number of values currently held
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Get the capacity of the window
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of values discarded because the window was full
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_under_capacity() {
        let buffer = SlidingWindowBuffer::new(10).unwrap();
        for i in 1..=4 {
            buffer.push(i);
        }
        assert_eq!(buffer.drain(), Some(vec![1, 2, 3, 4]));
        assert_eq!(buffer.drain(), None);
    }

    #[test]
    fn test_drain_at_capacity() {
        let buffer = SlidingWindowBuffer::new(3).unwrap();
        buffer.push(7);
        buffer.push(8);
        buffer.push(9);
        assert_eq!(buffer.drain(), Some(vec![7, 8, 9]));
        assert_eq!(buffer.evicted_count(), 0);
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let buffer = SlidingWindowBuffer::new(10).unwrap();
        for i in 1..=12 {
            buffer.push(i);
        }
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.drain(), Some((3..=12).collect()));
        assert_eq!(buffer.evicted_count(), 2);
    }

    #[test]
    fn test_fresh_buffer_drains_none() {
        let buffer = SlidingWindowBuffer::new(5).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.drain(), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SlidingWindowBuffer::new(0),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_drain_returns_independent_snapshot() {
        let buffer = SlidingWindowBuffer::new(4).unwrap();
        buffer.push(1);
        buffer.push(2);
        let snapshot = buffer.drain().unwrap();
        buffer.push(99);
        buffer.push(100);
        assert_eq!(snapshot, vec![1, 2]);
        assert_eq!(buffer.drain(), Some(vec![99, 100]));
    }

    #[test]
    fn test_window_reusable_after_drain() {
        let buffer = SlidingWindowBuffer::new(2).unwrap();
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.drain(), Some(vec![3, 4]));
        buffer.push(5);
        assert_eq!(buffer.drain(), Some(vec![5]));
    }

    #[test]
    fn test_concurrent_push_and_drain() {
        let buffer = SlidingWindowBuffer::new(8).unwrap();
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    buffer.push(i);
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            if let Some(batch) = buffer.drain() {
                assert!(batch.len() <= 8);
                assert!(batch.windows(2).all(|w| w[0] < w[1]));
                seen.extend(batch);
            }
        }
        writer.join().unwrap();
        seen.extend(buffer.drain().unwrap_or_default());

        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&9_999));
    }
}
