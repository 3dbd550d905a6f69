use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::channel::{bounded, select, Receiver, Sender};
use std::thread::{Builder, JoinHandle};
use tracing::{debug, trace};

/// Output side of a started stage
#[derive(Debug)]
pub struct StageOutput {
    /// Stream of values the stage forwards
    pub output: Receiver<i64>,
    /// Worker threads the stage started; they exit on cancellation
    pub workers: Vec<JoinHandle<()>>,
}

/// Trait for a processing stage in the pipeline
pub trait Stage: Send + 'static {
    /// Start the stage's workers reading from `input`.
    ///
    /// Returns immediately with the output stream. Every blocking wait inside
    /// the workers races `cancel`.
    fn process(
        self: Box<Self>,
        cancel: &CancellationToken,
        input: Receiver<i64>,
    ) -> Result<StageOutput>;

    /// Get a handle to this stage's counters
    fn metrics(&self) -> StageMetrics;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// Spawn a named worker thread for a stage
pub(crate) fn spawn_worker<F>(stage: &str, role: &str, work: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Builder::new()
        .name(format!("{stage}-{role}"))
        .spawn(work)
        .map_err(|e| PipelineError::ThreadError(format!("failed to spawn {stage} {role}: {e}")))
}

/// Hand `value` downstream unless cancellation fires first.
///
/// Returns `false` when the worker should stop: the token fired or the
/// downstream side is gone.
pub(crate) fn emit(cancel: &CancellationToken, output: &Sender<i64>, value: i64) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    select! {
        send(output, value) -> res => res.is_ok(),
        recv(cancel.signal()) -> _ => false,
    }
}

/// Worker loop shared by the per-value stages. `policy` returns the value to
/// forward, or `None` to drop the input.
fn run_per_value<F>(
    name: &str,
    cancel: &CancellationToken,
    input: Receiver<i64>,
    output: Sender<i64>,
    metrics: &StageMetrics,
    mut policy: F,
) where
    F: FnMut(i64) -> Option<i64>,
{
    debug!(stage = name, "worker started");
    while !cancel.is_cancelled() {
        select! {
            recv(input) -> msg => {
                let Ok(value) = msg else {
                    debug!(stage = name, "input closed");
                    break;
                };
                metrics.record_received();
                match policy(value) {
                    Some(out) => {
                        if !emit(cancel, &output, out) {
                            break;
                        }
                        metrics.record_forwarded();
                        trace!(stage = name, value = out, "forwarded");
                    }
                    None => {
                        metrics.record_dropped();
                        trace!(stage = name, value, "dropped");
                    }
                }
            }
            recv(cancel.signal()) -> _ => break,
        }
    }
    debug!(stage = name, "worker stopped");
}

/// Start a single-worker stage around a per-value policy
fn start_per_value<F>(
    name: String,
    metrics: StageMetrics,
    cancel: &CancellationToken,
    input: Receiver<i64>,
    policy: F,
) -> Result<StageOutput>
where
    F: FnMut(i64) -> Option<i64> + Send + 'static,
{
    let (tx, rx) = bounded(0);
    let cancel = cancel.clone();
    let thread_name = name.clone();
    let worker = spawn_worker(&thread_name, "worker", move || {
        run_per_value(&name, &cancel, input, tx, &metrics, policy);
    })?;
    Ok(StageOutput {
        output: rx,
        workers: vec![worker],
    })
}

/// Forwards a value iff it is strictly greater than zero
pub fn is_positive(value: i64) -> bool {
    value > 0
}

/// Forwards a value iff it is nonzero and evenly divisible by three
pub fn is_nonzero_multiple_of_three(value: i64) -> bool {
    value != 0 && value % 3 == 0
}

/// A pass-through stage, mostly useful for composing and testing pipelines
#[derive(Debug, Default)]
pub struct PassthroughStage {
    metrics: StageMetrics,
}

impl PassthroughStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for PassthroughStage {
    fn process(
        self: Box<Self>,
        cancel: &CancellationToken,
        input: Receiver<i64>,
    ) -> Result<StageOutput> {
        start_per_value("passthrough".into(), self.metrics, cancel, input, Some)
    }

    fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// A filtering stage that passes through values matching a predicate
#[derive(Debug)]
pub struct FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    name: String,
    predicate: F,
    metrics: StageMetrics,
}

impl<F> FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            metrics: StageMetrics::new(),
        }
    }

    /// Whether this filter forwards `value`
    pub fn accepts(&self, value: i64) -> bool {
        (self.predicate)(value)
    }
}

impl FilterStage<fn(i64) -> bool> {
    /// Keep strictly positive values
    pub fn positive() -> Self {
        Self::new("positive", is_positive)
    }

    /// Keep nonzero multiples of three
    pub fn multiple_of_three() -> Self {
        Self::new("multiple_of_three", is_nonzero_multiple_of_three)
    }
}

impl<F> Stage for FilterStage<F>
where
    F: Fn(i64) -> bool + Send + 'static,
{
    fn process(
        self: Box<Self>,
        cancel: &CancellationToken,
        input: Receiver<i64>,
    ) -> Result<StageOutput> {
        let FilterStage {
            name,
            predicate,
            metrics,
        } = *self;
        start_per_value(name, metrics, cancel, input, move |v| {
            predicate(v).then_some(v)
        })
    }

    fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A mapping stage that transforms each value
#[derive(Debug)]
pub struct MapStage<F>
where
    F: Fn(i64) -> i64 + Send + 'static,
{
    name: String,
    mapper: F,
    metrics: StageMetrics,
}

impl<F> MapStage<F>
where
    F: Fn(i64) -> i64 + Send + 'static,
{
    /// Create a new map stage
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
            metrics: StageMetrics::new(),
        }
    }
}

impl<F> Stage for MapStage<F>
where
    F: Fn(i64) -> i64 + Send + 'static,
{
    fn process(
        self: Box<Self>,
        cancel: &CancellationToken,
        input: Receiver<i64>,
    ) -> Result<StageOutput> {
        let MapStage {
            name,
            mapper,
            metrics,
        } = *self;
        start_per_value(name, metrics, cancel, input, move |v| Some(mapper(v)))
    }

    fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
