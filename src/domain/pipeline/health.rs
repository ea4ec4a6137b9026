//! Stage health - SLA classification of an entry's time in stage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

/// SLA applied when a stage has none configured.
pub const DEFAULT_SLA_DAYS: u32 = 7;

/// Traffic-light classification of time-in-stage against the stage SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageHealth {
    #[default]
    Green,
    Yellow,
    Red,
}

impl StageHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageHealth::Green => "green",
            StageHealth::Yellow => "yellow",
            StageHealth::Red => "red",
        }
    }
}

impl fmt::Display for StageHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pure calculator for stage health.
pub struct HealthCalculator;

impl HealthCalculator {
    /// Day count at which an entry turns yellow: `floor(sla_days * 0.8)`.
    pub fn warning_threshold(sla_days: u32) -> i64 {
        (i64::from(sla_days) * 4) / 5
    }

    /// Classifies a whole-day count against an SLA.
    ///
    /// Red strictly past the SLA, yellow from the warning threshold on,
    /// green otherwise.
    pub fn classify_days(days_in_stage: i64, sla_days: u32) -> StageHealth {
        if days_in_stage > i64::from(sla_days) {
            StageHealth::Red
        } else if days_in_stage >= Self::warning_threshold(sla_days) {
            StageHealth::Yellow
        } else {
            StageHealth::Green
        }
    }

    /// Classifies an entry that entered its stage at `entered_stage_at`.
    pub fn classify(now: Timestamp, entered_stage_at: Timestamp, sla_days: u32) -> StageHealth {
        Self::classify_days(now.whole_days_since(&entered_stage_at), sla_days)
    }
}
