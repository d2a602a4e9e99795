//! Schedule reconciler — converge a desired definition onto one stored row.

use serde::Serialize;
use tracing::info;

use tickq_config::SchedulerConfig;
use tickq_store::{StoreError, TickqStore};
use tickq_types::{MAX_INTERVAL_SECS, ScheduleSpec};

use crate::{Result, SchedError};

/// Whether a reconcile created a new row or updated an existing one.
/// Purely caller messaging; both outcomes leave one row per name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Created,
    Updated,
}

impl ReconcileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileStatus::Created => "created",
            ReconcileStatus::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub schedule_id: i64,
    pub status: ReconcileStatus,
}

fn validate(spec: &ScheduleSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(SchedError::InvalidSpec("name must not be empty".into()));
    }
    if spec.interval_value <= 0 {
        return Err(SchedError::InvalidSpec(format!(
            "interval_value must be positive, got {}",
            spec.interval_value
        )));
    }
    if spec.repeats < -1 {
        return Err(SchedError::InvalidSpec(format!(
            "repeats must be -1, 0, or positive, got {}",
            spec.repeats
        )));
    }
    match spec
        .interval_value
        .checked_mul(spec.interval_unit.seconds_per_unit())
    {
        Some(secs) if secs <= MAX_INTERVAL_SECS => Ok(()),
        _ => Err(SchedError::InvalidSpec(format!(
            "interval must not exceed {MAX_INTERVAL_SECS} seconds"
        ))),
    }
}

/// Upsert a named schedule: create it if absent, otherwise update the
/// existing row in place, preserving its identity and the runner-owned
/// execution history (`next_run`, `last_run`, `success_count`).
///
/// Losing a concurrent create race is absorbed here: a uniqueness
/// conflict on insert means someone else created the row between our
/// lookup and insert, so we go around and update it instead.
pub async fn reconcile(store: &TickqStore, spec: &ScheduleSpec) -> Result<ReconcileOutcome> {
    validate(spec)?;

    loop {
        if let Some(existing) = store.find_schedule(&spec.name).await? {
            // Targeted update: only the desired-definition columns are
            // written, so runner activity landing between our lookup and
            // this write keeps its next_run/last_run/success_count.
            match store.update_schedule_spec(existing.id, spec).await {
                Ok(()) => {
                    return Ok(ReconcileOutcome {
                        schedule_id: existing.id,
                        status: ReconcileStatus::Updated,
                    });
                }
                // Deleted underneath us; go around and create it.
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match store.insert_schedule(spec).await {
            Ok(id) => {
                return Ok(ReconcileOutcome {
                    schedule_id: id,
                    status: ReconcileStatus::Created,
                });
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Create the default schedule at startup when `auto_create` is set.
///
/// A convenience wrapper around [`reconcile`] invoked once by the serve
/// entry point; returns `None` when auto-creation is disabled.
pub async fn ensure_default_schedule(
    store: &TickqStore,
    config: &SchedulerConfig,
) -> Result<Option<ReconcileOutcome>> {
    if !config.auto_create {
        return Ok(None);
    }

    let spec = config.default_schedule();
    let outcome = reconcile(store, &spec).await?;
    info!(
        name = %spec.name,
        status = outcome.status.as_str(),
        "Default schedule reconciled (every {} seconds)",
        spec.interval_secs()
    );
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tickq_types::IntervalUnit;

    use super::*;

    fn spec(name: &str, interval_value: i64, repeats: i64) -> ScheduleSpec {
        ScheduleSpec {
            name: name.into(),
            target: "heartbeat".into(),
            interval_unit: IntervalUnit::Seconds,
            interval_value,
            repeats,
        }
    }

    #[tokio::test]
    async fn test_create_then_update_converges() {
        let store = TickqStore::open_in_memory().unwrap();

        let first = reconcile(&store, &spec("hb", 5, -1)).await.unwrap();
        assert_eq!(first.status, ReconcileStatus::Created);

        let second = reconcile(&store, &spec("hb", 30, 10)).await.unwrap();
        assert_eq!(second.status, ReconcileStatus::Updated);
        assert_eq!(second.schedule_id, first.schedule_id);

        let def = store.find_schedule("hb").await.unwrap().unwrap();
        assert_eq!(def.interval_value, 30);
        assert_eq!(def.repeats, 10);
    }

    #[tokio::test]
    async fn test_update_preserves_runner_history() {
        let store = TickqStore::open_in_memory().unwrap();
        let outcome = reconcile(&store, &spec("hb", 5, -1)).await.unwrap();

        // Simulate runner activity on the row.
        let mut def = store.get_schedule(outcome.schedule_id).await.unwrap();
        def.success_count = 3;
        def.last_run = Some(chrono::Utc::now());
        store.update_schedule(&def).await.unwrap();

        let again = reconcile(&store, &spec("hb", 10, -1)).await.unwrap();
        assert_eq!(again.schedule_id, outcome.schedule_id);

        let reloaded = store.find_schedule("hb").await.unwrap().unwrap();
        assert_eq!(reloaded.success_count, 3);
        assert!(reloaded.last_run.is_some());
        assert_eq!(reloaded.interval_value, 10);
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_row() {
        let store = Arc::new(TickqStore::open_in_memory().unwrap());

        let a = {
            let store = store.clone();
            tokio::spawn(async move { reconcile(&store, &spec("fresh", 5, -1)).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { reconcile(&store, &spec("fresh", 5, -1)).await })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.schedule_id, b.schedule_id);

        let def = store.find_schedule("fresh").await.unwrap().unwrap();
        assert_eq!(def.id, a.schedule_id);
    }

    #[tokio::test]
    async fn test_conflict_falls_back_to_update() {
        let store = TickqStore::open_in_memory().unwrap();

        // The row appears "between" a caller's lookup and insert; driving
        // the store directly shows the conflict the reconciler absorbs.
        store.insert_schedule(&spec("raced", 5, -1)).await.unwrap();
        let err = store.insert_schedule(&spec("raced", 5, -1)).await;
        assert!(matches!(err, Err(StoreError::Conflict(_))));

        let outcome = reconcile(&store, &spec("raced", 7, -1)).await.unwrap();
        assert_eq!(outcome.status, ReconcileStatus::Updated);
        let def = store.find_schedule("raced").await.unwrap().unwrap();
        assert_eq!(def.interval_value, 7);
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_specs() {
        let store = TickqStore::open_in_memory().unwrap();

        let err = reconcile(&store, &spec("", 5, -1)).await.unwrap_err();
        assert!(matches!(err, SchedError::InvalidSpec(_)));

        let err = reconcile(&store, &spec("hb", 0, -1)).await.unwrap_err();
        assert!(matches!(err, SchedError::InvalidSpec(_)));

        let err = reconcile(&store, &spec("hb", 5, -2)).await.unwrap_err();
        assert!(matches!(err, SchedError::InvalidSpec(_)));

        // Nothing was persisted.
        assert!(store.find_schedule("hb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validation_rejects_oversized_interval() {
        let store = TickqStore::open_in_memory().unwrap();

        // Would overflow i64 when normalized to seconds.
        let huge = ScheduleSpec {
            name: "huge".into(),
            target: "heartbeat".into(),
            interval_unit: IntervalUnit::Days,
            interval_value: i64::MAX,
            repeats: -1,
        };
        let err = reconcile(&store, &huge).await.unwrap_err();
        assert!(matches!(err, SchedError::InvalidSpec(_)));

        // Normalizes fine but past the cadence cap.
        let century_plus = ScheduleSpec {
            interval_value: 37000,
            ..huge.clone()
        };
        let err = reconcile(&store, &century_plus).await.unwrap_err();
        assert!(matches!(err, SchedError::InvalidSpec(_)));

        assert!(store.find_schedule("huge").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_default_schedule_gated_by_flag() {
        let store = TickqStore::open_in_memory().unwrap();

        let off = SchedulerConfig::default();
        assert!(ensure_default_schedule(&store, &off).await.unwrap().is_none());
        assert!(store.find_schedule("heartbeat_5s").await.unwrap().is_none());

        let on = SchedulerConfig {
            auto_create: true,
            ..Default::default()
        };
        let outcome = ensure_default_schedule(&store, &on).await.unwrap().unwrap();
        assert_eq!(outcome.status, ReconcileStatus::Created);

        let def = store.find_schedule("heartbeat_5s").await.unwrap().unwrap();
        assert_eq!(def.target, "heartbeat");
        assert_eq!(def.interval_secs(), 5);
        assert_eq!(def.repeats, -1);

        // Idempotent on restart.
        let again = ensure_default_schedule(&store, &on).await.unwrap().unwrap();
        assert_eq!(again.status, ReconcileStatus::Updated);
        assert_eq!(again.schedule_id, outcome.schedule_id);
    }
}
