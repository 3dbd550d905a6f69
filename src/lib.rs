//! A cancellable, multi-stage integer stream pipeline.
//!
//! Stages run on their own threads and hand values to each other over
//! rendezvous channels. Every blocking wait races one shared
//! [`CancellationToken`], so firing it stops the whole chain even while values
//! are mid-transfer.
//!
//! # Features
//!
//! - Filter, map and pass-through stages behind a single [`Stage`] trait
//! - [`BufferStage`]: batches values in a [`SlidingWindowBuffer`] and re-emits
//!   them on a timer, keeping only the most recent values
//! - Injectable [`Clock`] so flush timing can be driven by hand in tests
//! - Per-stage counters: received, forwarded, dropped, evicted, flushes
//! - Builder pattern for easy pipeline construction
//!
//! # Example
//!
//! ```ignore
//! use int_pipeline::{CancellationToken, FilterStage, PipelineBuilder};
//!
//! let running = PipelineBuilder::new()
//!     .add_stage(FilterStage::positive())
//!     .add_stage(FilterStage::multiple_of_three())
//!     .build()?
//!     .run(source)?;
//!
//! for value in running.output().iter() {
//!     println!("{value}");
//! }
//! running.shutdown()?;
//! ```

pub mod buffer;
pub mod buffer_stage;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stage;

// Re-exports for convenience
pub use buffer::SlidingWindowBuffer;
pub use buffer_stage::{BufferStage, DEFAULT_FLUSH_INTERVAL, DEFAULT_WINDOW_CAPACITY};
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, RunningPipeline};
pub use stage::{
    is_nonzero_multiple_of_three, is_positive, FilterStage, MapStage, PassthroughStage, Stage,
    StageOutput,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
