//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Log filter must not be empty")]
    EmptyLogFilter,

    #[error("Scheduler poll interval must be at least one second")]
    InvalidPollInterval,

    #[error("Inactivity threshold must be at least one day")]
    InvalidInactivityDays,

    #[error("max_concurrent_executions must be between 1 and 256")]
    InvalidConcurrency,

    #[error("max_cascade_depth must not exceed 16")]
    CascadeDepthTooLarge,

    #[error("retry_max_attempts must be between 1 and 10")]
    InvalidRetryAttempts,

    #[error("Retry backoff: initial delay exceeds maximum delay")]
    InvalidBackoff,
}
