//! tickq-types: shared domain types for the tickq workspace.

use serde::{Deserialize, Serialize};

/// Upper bound on a normalized schedule cadence: 100 years in seconds.
/// Keeps `next_run` arithmetic comfortably inside chrono's range.
pub const MAX_INTERVAL_SECS: i64 = 100 * 365 * 86400;

/// Cadence unit for a recurring schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    /// Number of seconds in one unit.
    pub fn seconds_per_unit(self) -> i64 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
            IntervalUnit::Days => 86400,
        }
    }

    /// Stable string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        }
    }

    /// Parse the string form back into a unit.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seconds" => Some(IntervalUnit::Seconds),
            "minutes" => Some(IntervalUnit::Minutes),
            "hours" => Some(IntervalUnit::Hours),
            "days" => Some(IntervalUnit::Days),
            _ => None,
        }
    }
}

fn default_target() -> String {
    "heartbeat".to_string()
}

fn default_interval_value() -> i64 {
    5
}

fn default_repeats() -> i64 {
    -1
}

/// Desired definition for a named recurring schedule.
///
/// Only `name` is required; the remaining fields default to the
/// well-known heartbeat cadence (every 5 seconds, forever).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// Unique schedule name, immutable once created.
    pub name: String,
    /// Registered handler key resolved by the runner.
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub interval_unit: IntervalUnit,
    #[serde(default = "default_interval_value")]
    pub interval_value: i64,
    /// -1 = run forever, 0 = disabled, N > 0 = N remaining executions.
    #[serde(default = "default_repeats")]
    pub repeats: i64,
}

impl ScheduleSpec {
    /// Cadence normalized to seconds. Saturates rather than overflows;
    /// the reconciler rejects anything past [`MAX_INTERVAL_SECS`] before
    /// a spec is stored.
    pub fn interval_secs(&self) -> i64 {
        self.interval_value
            .saturating_mul(self.interval_unit.seconds_per_unit())
    }
}

/// Lifecycle state of a one-off task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TaskStatus::Queued),
            "running" => Some(TaskStatus::Running),
            "success" => Some(TaskStatus::Success),
            "failure" => Some(TaskStatus::Failure),
            _ => None,
        }
    }
}
