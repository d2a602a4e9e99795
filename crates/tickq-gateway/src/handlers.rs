//! HTTP request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use tickq_sched::reconciler::reconcile;
use tickq_sched::status::{ScheduleStatus, describe_interval, status};
use tickq_store::TaskRecord;
use tickq_types::ScheduleSpec;

use crate::AppState;
use crate::error::ApiError;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct ScheduleUpserted {
    pub status: &'static str,
    pub message: String,
    pub schedule_id: i64,
    pub next_run: Option<DateTime<Utc>>,
    pub interval: String,
}

/// POST /api/schedules — create or update a named schedule.
pub async fn upsert_schedule(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<ScheduleSpec>,
) -> Result<Json<ScheduleUpserted>, ApiError> {
    let outcome = reconcile(&state.store, &spec).await?;

    // Read back runner-populated fields; next_run may still be unset
    // until the runner's next tick.
    let def = state.store.get_schedule(outcome.schedule_id).await?;

    info!(name = %spec.name, status = outcome.status.as_str(), "Schedule reconciled");

    Ok(Json(ScheduleUpserted {
        status: outcome.status.as_str(),
        message: format!("Schedule '{}' {}", spec.name, outcome.status.as_str()),
        schedule_id: outcome.schedule_id,
        next_run: def.next_run,
        interval: describe_interval(def.interval_secs()),
    }))
}

/// GET /api/schedules/{name} — status projection; absence is a 200.
pub async fn schedule_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ScheduleStatus>, ApiError> {
    Ok(Json(status(&state.store, &name).await?))
}

/// DELETE /api/schedules/{name} — remove a schedule, 404 when absent.
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_schedule(&name).await? {
        return Err(ApiError::NotFound(format!("Schedule '{name}' not found")));
    }

    info!(name = %name, "Schedule deleted");
    Ok(Json(json!({
        "status": "success",
        "message": format!("Schedule '{name}' deleted"),
    })))
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub target: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct TaskQueued {
    pub task_id: String,
    pub status: &'static str,
    pub message: String,
}

/// POST /api/tasks — enqueue a one-off task for the runner.
pub async fn enqueue_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<TaskQueued>, ApiError> {
    if !state.registry.contains(&req.target) {
        return Err(ApiError::BadRequest(format!(
            "Unknown target '{}'; registered: {}",
            req.target,
            state.registry.names().join(", ")
        )));
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    state
        .store
        .enqueue_task(&task_id, &req.target, &req.args)
        .await?;

    info!(task_id = %task_id, target = %req.target, "Task enqueued");
    Ok(Json(TaskQueued {
        task_id,
        status: "queued",
        message: "Task has been enqueued".into(),
    }))
}

/// GET /api/tasks/{id} — fetch a task row with its result, if any.
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    match state.store.get_task(&id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::NotFound(format!("Task '{id}' not found"))),
    }
}
