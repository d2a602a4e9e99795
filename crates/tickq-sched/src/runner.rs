//! Runner — background loop executing due schedules and queued tasks.
//!
//! The runner owns all execution metadata: it is the only writer of
//! `next_run`, `last_run` and `success_count` on schedules, and the only
//! component that moves tasks out of the `queued` state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use tickq_store::{ScheduleDefinition, TaskRecord, TickqStore};
use tickq_types::{MAX_INTERVAL_SECS, TaskStatus};

use crate::Result;
use crate::registry::HandlerRegistry;

pub struct Runner {
    store: Arc<TickqStore>,
    registry: Arc<HandlerRegistry>,
    tick: Duration,
}

impl Runner {
    pub fn new(store: Arc<TickqStore>, registry: Arc<HandlerRegistry>, tick: Duration) -> Self {
        Self {
            store,
            registry,
            tick,
        }
    }

    /// Run the polling loop forever. Individual tick failures are logged
    /// and retried on the next tick; only the store going away would
    /// keep this loop erroring.
    pub async fn run(self: Arc<Self>) {
        info!("Runner started (tick every {:?})", self.tick);
        loop {
            if let Err(e) = self.tick_once().await {
                warn!("Runner tick failed: {e}");
            }
            tokio::time::sleep(self.tick).await;
        }
    }

    /// One polling cycle: fire due schedules, then drain queued tasks.
    ///
    /// Bookkeeping failures on one item must not starve the rest of the
    /// cycle; they are logged and the cycle moves on.
    pub async fn tick_once(&self) -> Result<()> {
        let now = Utc::now();
        for schedule in self.store.due_schedules(now).await? {
            let name = schedule.name.clone();
            if let Err(e) = self.fire_schedule(schedule).await {
                warn!(name = %name, "Schedule bookkeeping failed: {e}");
            }
        }
        for task in self.store.claim_queued_tasks().await? {
            let task_id = task.id.clone();
            if let Err(e) = self.run_task(task).await {
                warn!(task_id = %task_id, "Task bookkeeping failed: {e}");
            }
        }
        Ok(())
    }

    /// Execute one due schedule and advance its execution metadata:
    /// `last_run` is set, finite `repeats` decrement, `next_run` moves
    /// one interval ahead, and `success_count` increments only when the
    /// handler succeeded.
    async fn fire_schedule(&self, mut schedule: ScheduleDefinition) -> Result<()> {
        let outcome = match self.registry.get(&schedule.target) {
            Some(handler) => handler.execute(json!({})).await,
            None => Err(anyhow::anyhow!("unknown target: {}", schedule.target)),
        };

        let now = Utc::now();
        schedule.last_run = Some(now);
        // Clamp the cadence so rows written outside the reconciler's
        // validation still yield a representable next_run.
        let interval_secs = schedule.interval_secs().min(MAX_INTERVAL_SECS);
        schedule.next_run = Some(now + chrono::Duration::seconds(interval_secs));
        if schedule.repeats > 0 {
            schedule.repeats -= 1;
        }

        match outcome {
            Ok(_) => {
                schedule.success_count += 1;
                info!(name = %schedule.name, target = %schedule.target, "Schedule fired");
            }
            Err(e) => {
                warn!(name = %schedule.name, target = %schedule.target, "Schedule failed: {e}");
            }
        }

        self.store.update_schedule(&schedule).await?;
        Ok(())
    }

    /// Execute one claimed task and record its terminal outcome.
    async fn run_task(&self, task: TaskRecord) -> Result<()> {
        let outcome = match self.registry.get(&task.target) {
            Some(handler) => handler.execute(task.args.clone()).await,
            None => Err(anyhow::anyhow!("unknown target: {}", task.target)),
        };

        let (status, result) = match outcome {
            Ok(value) => (TaskStatus::Success, value),
            Err(e) => {
                warn!(task_id = %task.id, target = %task.target, "Task failed: {e}");
                (TaskStatus::Failure, json!({"error": e.to_string()}))
            }
        };

        self.store
            .complete_task(&task.id, status, Some(&result), Utc::now())
            .await?;
        info!(task_id = %task.id, status = status.as_str(), "Task finished");
        Ok(())
    }
}
