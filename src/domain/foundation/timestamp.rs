//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Whole days elapsed since `earlier`, rounded toward negative infinity.
    ///
    /// 23h59m counts as 0 days, 24h as 1 day. A future `earlier` yields a
    /// negative count.
    pub fn whole_days_since(&self, earlier: &Timestamp) -> i64 {
        self.duration_since(earlier)
            .num_seconds()
            .div_euclid(SECONDS_PER_DAY)
    }

    /// Creates a new timestamp by adding the specified number of days.
    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by subtracting the specified number of days.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Creates a new timestamp by adding the specified number of hours.
    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }

    /// Creates a new timestamp by adding the specified number of minutes.
    pub fn plus_minutes(&self, minutes: i64) -> Self {
        Self(self.0 + Duration::minutes(minutes))
    }

    /// Adds `hours`, or `None` when the result is not a representable time.
    pub fn checked_plus_hours(&self, hours: i64) -> Option<Self> {
        Duration::try_hours(hours)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
    }

    /// Adds `minutes`, or `None` when the result is not a representable time.
    pub fn checked_plus_minutes(&self, minutes: i64) -> Option<Self> {
        Duration::try_minutes(minutes)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}
