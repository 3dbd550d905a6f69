use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while assembling or running a pipeline.
///
/// Values flowing through the stages never produce errors; these cover the
/// infrastructure around them.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("Cannot start pipeline with no stages")]
    NoStages,

    /// Worker thread could not be spawned or panicked
    #[error("Thread error: {0}")]
    ThreadError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Console input/output failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
