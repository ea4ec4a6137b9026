//! Automation engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::automation::EvaluationOrder;

/// Rule evaluation and execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// `priority` (default) or `insertion`
    #[serde(default)]
    pub evaluation_order: EvaluationOrder,

    /// Automation-originated stage changes deeper than this are dropped
    #[serde(default = "default_max_cascade_depth")]
    pub max_cascade_depth: u32,

    /// Trigger events dispatched concurrently by `dispatch_all`
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,

    /// Per-execution time limit; 0 disables it
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,

    /// Attempts per action, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub retry_max_backoff_ms: u64,
}

impl AutomationConfig {
    pub fn execution_timeout(&self) -> Option<Duration> {
        (self.execution_timeout_secs > 0).then(|| Duration::from_secs(self.execution_timeout_secs))
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_cascade_depth > 16 {
            return Err(ValidationError::CascadeDepthTooLarge);
        }
        if self.max_concurrent_executions == 0 || self.max_concurrent_executions > 256 {
            return Err(ValidationError::InvalidConcurrency);
        }
        if self.retry_max_attempts == 0 || self.retry_max_attempts > 10 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if self.retry_initial_backoff_ms > self.retry_max_backoff_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            evaluation_order: EvaluationOrder::default(),
            max_cascade_depth: default_max_cascade_depth(),
            max_concurrent_executions: default_max_concurrent(),
            execution_timeout_secs: default_execution_timeout(),
            retry_max_attempts: default_retry_attempts(),
            retry_initial_backoff_ms: default_initial_backoff(),
            retry_max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_cascade_depth() -> u32 {
    3
}

fn default_max_concurrent() -> usize {
    8
}

fn default_execution_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    5_000
}
