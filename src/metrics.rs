use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage counters, shared between a stage's workers and whoever observes them
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values taken from the input stream
    received: Arc<AtomicU64>,
    /// Values handed to the output stream
    forwarded: Arc<AtomicU64>,
    /// Values rejected by the stage's policy
    dropped: Arc<AtomicU64>,
    /// Values lost to sliding-window eviction
    evicted: Arc<AtomicU64>,
    /// Non-empty flushes performed
    flushes: Arc<AtomicU64>,
    /// Creation time for throughput calculation
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            evicted: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the eviction total; the sliding window keeps its own running count
    pub fn set_evicted(&self, total: u64) {
        self.evicted.store(total, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn total_flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Calculate forwarded values per second since creation
    pub fn throughput_vps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_forwarded() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received(),
            total_forwarded: self.total_forwarded(),
            total_dropped: self.total_dropped(),
            total_evicted: self.total_evicted(),
            total_flushes: self.total_flushes(),
            throughput_vps: self.throughput_vps(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_forwarded: u64,
    pub total_dropped: u64,
    pub total_evicted: u64,
    pub total_flushes: u64,
    pub throughput_vps: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Dropped: {}, Evicted: {}, Flushes: {}, \
             Throughput: {:.2} values/s, Elapsed: {:.2}s",
            self.total_received,
            self.total_forwarded,
            self.total_dropped,
            self.total_evicted,
            self.total_flushes,
            self.throughput_vps,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_metrics_counters() {
        let metrics = StageMetrics::new();
        for _ in 0..10 {
            metrics.record_received();
        }
        for _ in 0..7 {
            metrics.record_forwarded();
        }
        for _ in 0..3 {
            metrics.record_dropped();
        }
        metrics.record_flush();
        metrics.set_evicted(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_received, 10);
        assert_eq!(snapshot.total_forwarded, 7);
        assert_eq!(snapshot.total_dropped, 3);
        assert_eq!(snapshot.total_evicted, 4);
        assert_eq!(snapshot.total_flushes, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = StageMetrics::new();
        let clone = metrics.clone();
        clone.record_forwarded();
        assert_eq!(metrics.total_forwarded(), 1);
        assert!(metrics.throughput_vps() >= 0.0);
    }

    #[test]
    fn test_snapshot_format() {
        let metrics = StageMetrics::new();
        metrics.record_received();
        let line = metrics.snapshot().format();
        assert!(line.starts_with("Received: 1, Forwarded: 0"));
    }
}
