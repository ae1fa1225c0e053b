//! Breaker statistics.
//!
//! [`BreakerStats`] is the mutable record owned by a single breaker and only
//! touched under that breaker's lock. [`StatsSnapshot`] is the read-only
//! copy handed to everyone else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::state::CircuitState;

/// Mutable per-breaker state and counters.
#[derive(Debug, Clone, Default)]
pub(crate) struct BreakerStats {
    pub state: CircuitState,

    /// Failures since the last CLOSED or HALF_OPEN entry
    pub failure_count: u64,

    /// Successes since the last CLOSED or HALF_OPEN entry
    pub success_count: u64,

    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,

    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_state_change_time: Option<DateTime<Utc>>,

    /// Monotonic instant of the most recent OPEN entry
    pub opened_at: Option<Instant>,
}

impl BreakerStats {
    /// Zero the windowed counters on CLOSED or HALF_OPEN entry.
    pub fn clear_window(&mut self) {
        self.failure_count = 0;
        self.success_count = 0;
    }
}

/// Immutable copy of a breaker's state, counters, and config.
///
/// This is the shape served to operator dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub is_open: bool,

    /// Seconds until a trial call is allowed; 0 unless open
    pub time_until_retry: f64,

    pub failure_count: u64,
    pub success_count: u64,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,

    pub failure_threshold: u32,
    pub timeout_seconds: f64,
    pub success_threshold: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state_change_time: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    /// Share of recorded outcomes that were failures (0.0 to 1.0).
    ///
    /// Short-circuited and unclassified calls are not outcomes.
    pub fn failure_rate(&self) -> f64 {
        let recorded = self.total_failures + self.total_successes;
        if recorded == 0 {
            return 0.0;
        }
        self.total_failures as f64 / recorded as f64
    }

    /// Calls that produced neither a recorded success nor a recorded failure.
    pub fn unrecorded_calls(&self) -> u64 {
        self.total_calls
            .saturating_sub(self.total_failures + self.total_successes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            name: "database".to_string(),
            state: CircuitState::Open,
            is_open: true,
            time_until_retry: 12.5,
            failure_count: 3,
            success_count: 0,
            total_calls: 7,
            total_failures: 3,
            total_successes: 1,
            failure_threshold: 3,
            timeout_seconds: 60.0,
            success_threshold: 2,
            last_failure_time: None,
            last_success_time: None,
            last_state_change_time: None,
        }
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(snapshot()).unwrap();

        assert_eq!(json["name"], "database");
        assert_eq!(json["state"], "open");
        assert_eq!(json["is_open"], true);
        assert_eq!(json["time_until_retry"], 12.5);
        assert_eq!(json["timeout_seconds"], 60.0);
        assert!(json.get("last_failure_time").is_none());
    }

    #[test]
    fn test_derived_rates() {
        let snap = snapshot();
        assert_eq!(snap.failure_rate(), 0.75);
        assert_eq!(snap.unrecorded_calls(), 3);
    }

    #[test]
    fn test_clear_window_keeps_totals() {
        let mut stats = BreakerStats {
            failure_count: 4,
            success_count: 1,
            total_calls: 5,
            total_failures: 4,
            total_successes: 1,
            ..Default::default()
        };
        stats.clear_window();

        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.total_calls, 5);
    }
}
