//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `LEAD_PIPELINE` prefix
//! and `__` between nesting levels. Every value has a default.
//!
//! # Example
//!
//! ```no_run
//! use lead_pipeline::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod automation;
mod error;
mod logging;
mod scheduler;
mod storage;

pub use automation::AutomationConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use scheduler::SchedulerConfig;
pub use storage::StorageConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LEAD_PIPELINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `LEAD_PIPELINE__SCHEDULER__POLL_INTERVAL_SECS=60`
    /// - `LEAD_PIPELINE__AUTOMATION__EVALUATION_ORDER=insertion`
    /// - `LEAD_PIPELINE__STORAGE__RULES_FILE=./data/rules.yaml`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LEAD_PIPELINE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.logging.validate()?;
        self.automation.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}
