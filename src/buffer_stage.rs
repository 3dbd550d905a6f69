use crate::buffer::SlidingWindowBuffer;
use crate::cancel::CancellationToken;
use crate::clock::{Clock, SystemClock};
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{emit, spawn_worker, Stage, StageOutput};
use crossbeam::channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default number of values retained between flushes
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Default time between flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Batches values in a sliding window and re-emits them on a timer.
///
/// A collector worker pushes every input value into the window. A flusher
/// worker drains the window on every clock tick and emits the drained values
/// one by one, oldest first. If more than `capacity` values arrive between two
/// ticks, the oldest are lost.
pub struct BufferStage {
    name: String,
    window: SlidingWindowBuffer,
    flush_interval: Duration,
    clock: Arc<dyn Clock>,
    metrics: StageMetrics,
}

impl BufferStage {
    /// Create a buffer stage ticking on the system clock
    pub fn new(capacity: usize, flush_interval: Duration) -> Result<Self> {
        if flush_interval.is_zero() {
            return Err(PipelineError::ConfigError(
                "flush interval must be greater than zero".into(),
            ));
        }
        Ok(Self {
            name: "buffer".into(),
            window: SlidingWindowBuffer::new(capacity)?,
            flush_interval,
            clock: Arc::new(SystemClock),
            metrics: StageMetrics::new(),
        })
    }

    /// Replace the tick source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rename the stage
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get a handle to the stage's sliding window
    pub fn window(&self) -> SlidingWindowBuffer {
        self.window.clone()
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

impl Stage for BufferStage {
    fn process(
        self: Box<Self>,
        cancel: &CancellationToken,
        input: Receiver<i64>,
    ) -> Result<StageOutput> {
        let (tx, rx) = bounded(0);
        let ticks = self.clock.ticker(self.flush_interval);
        let input_closed = Arc::new(AtomicBool::new(false));

        let collector = {
            let name = self.name.clone();
            let window = self.window.clone();
            let metrics = self.metrics.clone();
            let cancel = cancel.clone();
            let input_closed = Arc::clone(&input_closed);
            spawn_worker(&self.name, "collector", move || {
                collect(&name, &cancel, input, &window, &metrics);
                input_closed.store(true, Ordering::Release);
            })?
        };

        let flusher = {
            let name = self.name.clone();
            let window = self.window.clone();
            let metrics = self.metrics.clone();
            let cancel = cancel.clone();
            spawn_worker(&self.name, "flusher", move || {
                flush_on_tick(&name, &cancel, ticks, &window, tx, &metrics, &input_closed);
            })
        };
        let flusher = match flusher {
            Ok(handle) => handle,
            Err(e) => return Err(abandon_collector(&self.name, cancel, collector, e)),
        };

        Ok(StageOutput {
            output: rx,
            workers: vec![collector, flusher],
        })
    }

    fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stop and reap a collector whose flusher never started, so no worker
/// outlives the failed `process` call.
fn abandon_collector(
    name: &str,
    cancel: &CancellationToken,
    collector: JoinHandle<()>,
    err: PipelineError,
) -> PipelineError {
    cancel.cancel();
    if collector.join().is_err() {
        warn!(stage = name, "collector panicked while shutting down");
    }
    err
}

fn collect(
    name: &str,
    cancel: &CancellationToken,
    input: Receiver<i64>,
    window: &SlidingWindowBuffer,
    metrics: &StageMetrics,
) {
    debug!(stage = name, "collector started");
    while !cancel.is_cancelled() {
        select! {
            recv(input) -> msg => {
                let Ok(value) = msg else {
                    debug!(stage = name, "input closed");
                    break;
                };
                window.push(value);
                metrics.record_received();
                metrics.set_evicted(window.evicted_count());
                trace!(stage = name, value, "collected");
            }
            recv(cancel.signal()) -> _ => break,
        }
    }
    debug!(stage = name, "collector stopped");
}

fn flush_on_tick(
    name: &str,
    cancel: &CancellationToken,
    ticks: Receiver<Instant>,
    window: &SlidingWindowBuffer,
    output: Sender<i64>,
    metrics: &StageMetrics,
    input_closed: &AtomicBool,
) {
    debug!(stage = name, "flusher started");
    'ticks: while !cancel.is_cancelled() {
        select! {
            recv(ticks) -> tick => {
                if tick.is_err() {
                    debug!(stage = name, "tick source closed");
                    break;
                }
                // Read before draining: once set, the collector pushes nothing more.
                let last_flush = input_closed.load(Ordering::Acquire);
                if let Some(batch) = window.drain() {
                    metrics.record_flush();
                    debug!(stage = name, count = batch.len(), "flushing window");
                    for value in batch {
                        if !emit(cancel, &output, value) {
                            break 'ticks;
                        }
                        metrics.record_forwarded();
                    }
                }
                if last_flush {
                    break;
                }
            }
            recv(cancel.signal()) -> _ => break,
        }
    }
    debug!(stage = name, "flusher stopped");
}
