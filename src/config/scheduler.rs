//! Periodic scheduler configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings for the time-elapsed / inactivity driver
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Idle days before an `inactivity` trigger fires
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: u32,

    /// Recompute cached stage health on every tick
    #[serde(default = "default_enabled")]
    pub refresh_health: bool,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.inactivity_days == 0 {
            return Err(ValidationError::InvalidInactivityDays);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_poll_interval(),
            inactivity_days: default_inactivity_days(),
            refresh_health: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    300
}

fn default_inactivity_days() -> u32 {
    14
}
