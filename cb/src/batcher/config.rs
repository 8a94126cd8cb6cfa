//! Batcher configuration

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DEFAULT_DELAY_MS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE};

/// Batcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Delay between the end of one dispatch cycle and the start of the next
    /// while the queue is non-empty. Skipped when a new submission arrives.
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Max requests claimed into one worker call
    #[serde(rename = "max-batch-size", default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Max requests waiting (unclaimed) at once
    #[serde(rename = "max-queue-size", default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            max_batch_size: default_max_batch_size(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl BatcherConfig {
    /// Get the inter-cycle delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Check the limits before building a batcher from loaded config
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(eyre!("max-batch-size must be at least 1"));
        }
        if self.max_queue_size == 0 {
            return Err(eyre!("max-queue-size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatcherConfig::default();
        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.max_queue_size, usize::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delay_duration() {
        let config = BatcherConfig {
            delay_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: BatcherConfig = serde_yaml::from_str("max-batch-size: 3\n").unwrap();
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.max_queue_size, usize::MAX);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = BatcherConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BatcherConfig {
            max_queue_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max-queue-size"));
    }
}
