use crate::buffer_stage::BufferStage;
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{FilterStage, Stage};
use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    cancel: Option<CancellationToken>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            cancel: None,
        }
    }

    /// Append a stage; stages run in the order they are added
    pub fn add_stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage
    pub fn add_boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Share an existing cancellation token instead of creating one
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        Ok(Pipeline {
            stages: self.stages,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered chain of stages sharing one cancellation token
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build the reference chain: positive filter, multiple-of-three filter,
    /// then a buffer stage ticking on `clock`.
    pub fn from_config(
        config: &PipelineConfig,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        PipelineBuilder::new()
            .with_cancellation(cancel)
            .add_stage(FilterStage::positive())
            .add_stage(FilterStage::multiple_of_three())
            .add_stage(
                BufferStage::new(config.window_capacity, config.flush_interval)?.with_clock(clock),
            )
            .build()
    }

    /// Get the token shared by every stage
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Names of the stages, in execution order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Start every stage, feeding the first from `source` and each following
    /// stage from its predecessor's output.
    pub fn run(self, source: Receiver<i64>) -> Result<RunningPipeline> {
        let mut stream = source;
        let mut stages = Vec::with_capacity(self.stages.len());
        let mut workers = Vec::new();

        for stage in self.stages {
            let name = stage.name().to_string();
            let metrics = stage.metrics();
            let started = stage.process(&self.cancel, stream);
            let out = match started {
                Ok(out) => out,
                Err(e) => {
                    // Stop whatever is already running before bailing out.
                    self.cancel.cancel();
                    join_all(workers)?;
                    return Err(e);
                }
            };
            debug!(stage = %name, workers = out.workers.len(), "stage started");
            workers.extend(out.workers.into_iter().map(|w| (name.clone(), w)));
            stages.push((name, metrics));
            stream = out.output;
        }

        info!(stages = stages.len(), "pipeline running");
        Ok(RunningPipeline {
            output: stream,
            cancel: self.cancel,
            stages,
            workers,
        })
    }
}

fn join_all(workers: Vec<(String, JoinHandle<()>)>) -> Result<()> {
    let mut failed = Vec::new();
    for (name, handle) in workers {
        if handle.join().is_err() {
            failed.push(name);
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::ThreadError(format!(
            "worker panicked in stage(s): {}",
            failed.join(", ")
        )))
    }
}

/// A running pipeline that can be observed and stopped
pub struct RunningPipeline {
    output: Receiver<i64>,
    cancel: CancellationToken,
    stages: Vec<(String, StageMetrics)>,
    workers: Vec<(String, JoinHandle<()>)>,
}

impl RunningPipeline {
    /// Get the output stream of the last stage
    pub fn output(&self) -> Receiver<i64> {
        self.output.clone()
    }

    /// Get the token shared by every stage
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.stages.get(index).map(|(_, m)| m)
    }

    /// Whether every worker has exited
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|(_, w)| w.is_finished())
    }

    /// Wait for every worker to exit without cancelling
    pub fn wait(self) -> Result<()> {
        join_all(self.workers)
    }

    /// Cancel the pipeline and wait until every worker has exited
    pub fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        join_all(self.workers)?;
        info!("pipeline stopped");
        Ok(())
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, (name, metrics)) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                name,
                metrics.snapshot().format()
            ));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::stage::PassthroughStage;
    use crossbeam::channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::new()
            .add_stage(FilterStage::positive())
            .add_stage(PassthroughStage::new())
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["positive", "passthrough"]);
    }

    #[test]
    fn test_no_stages_error() {
        let result = PipelineBuilder::new().build();
        assert!(matches!(result, Err(PipelineError::NoStages)));
    }

    #[test]
    fn test_shared_cancellation() {
        let cancel = CancellationToken::new();
        let pipeline = Pipeline::builder()
            .with_cancellation(cancel.clone())
            .add_stage(PassthroughStage::new())
            .build()
            .unwrap();
        pipeline.cancellation().cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_from_config_layout() {
        let pipeline = Pipeline::from_config(
            &PipelineConfig::default(),
            Arc::new(ManualClock::new()),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["positive", "multiple_of_three", "buffer"]
        );
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = PipelineConfig::new(0, Duration::from_secs(1));
        let result = Pipeline::from_config(
            &config,
            Arc::new(ManualClock::new()),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let (_tx, rx) = bounded::<i64>(0);
        let running = PipelineBuilder::new()
            .add_stage(PassthroughStage::new())
            .add_stage(PassthroughStage::new())
            .build()
            .unwrap()
            .run(rx)
            .unwrap();

        let output = running.output();
        running.shutdown().unwrap();
        assert!(output.recv().is_err());
    }

    #[test]
    fn test_metrics_summary_lists_stages() {
        let (_tx, rx) = bounded::<i64>(0);
        let running = PipelineBuilder::new()
            .add_stage(FilterStage::positive())
            .build()
            .unwrap()
            .run(rx)
            .unwrap();

        let summary = running.metrics_summary();
        assert!(summary.contains("Stage 0 (positive)"));
        running.shutdown().unwrap();
    }
}
