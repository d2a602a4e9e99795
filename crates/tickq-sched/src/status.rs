//! Status reporter — read-only projection of a schedule for display.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tickq_store::{ScheduleDefinition, TickqStore};

use crate::Result;

/// Display-oriented view of a named schedule.
///
/// Absence is a normal outcome, not an error. The interval string is
/// derived from `interval_unit`/`interval_value` on every call; it is
/// never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScheduleStatus {
    Missing {
        exists: bool,
        message: String,
    },
    Active {
        exists: bool,
        name: String,
        next_run: Option<DateTime<Utc>>,
        interval: String,
        repeats: i64,
        success_count: i64,
        last_run: Option<DateTime<Utc>>,
    },
}

impl ScheduleStatus {
    pub fn exists(&self) -> bool {
        matches!(self, ScheduleStatus::Active { .. })
    }

    fn missing(name: &str) -> Self {
        ScheduleStatus::Missing {
            exists: false,
            message: format!("Schedule '{name}' not found. POST /api/schedules to create it."),
        }
    }

    fn from_definition(def: &ScheduleDefinition) -> Self {
        ScheduleStatus::Active {
            exists: true,
            name: def.name.clone(),
            next_run: def.next_run,
            interval: describe_interval(def.interval_secs()),
            repeats: def.repeats,
            success_count: def.success_count,
            last_run: def.last_run,
        }
    }
}

/// Human-readable cadence, always rendered in seconds.
pub fn describe_interval(interval_secs: i64) -> String {
    format!("every {interval_secs} seconds")
}

/// Project the named schedule into its status payload. Never mutates.
pub async fn status(store: &TickqStore, name: &str) -> Result<ScheduleStatus> {
    match store.find_schedule(name).await? {
        Some(def) => Ok(ScheduleStatus::from_definition(&def)),
        None => Ok(ScheduleStatus::missing(name)),
    }
}
