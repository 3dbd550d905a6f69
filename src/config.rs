use crate::buffer_stage::{DEFAULT_FLUSH_INTERVAL, DEFAULT_WINDOW_CAPACITY};
use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Tunables of the reference pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Values the buffer stage retains between flushes
    pub window_capacity: usize,
    /// Time between buffer flushes
    pub flush_interval: Duration,
}

impl PipelineConfig {
    pub fn new(window_capacity: usize, flush_interval: Duration) -> Self {
        Self {
            window_capacity,
            flush_interval,
        }
    }

    /// Check the config before any worker is started
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(PipelineError::ConfigError(
                "window capacity must be greater than zero".into(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(PipelineError::ConfigError(
                "flush interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_FLUSH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_capacity, 10);
        assert_eq!(config.flush_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let zero_capacity = PipelineConfig::new(0, Duration::from_secs(1));
        assert!(matches!(
            zero_capacity.validate(),
            Err(PipelineError::ConfigError(_))
        ));

        let zero_interval = PipelineConfig::new(4, Duration::ZERO);
        assert!(zero_interval.validate().is_err());
    }
}
