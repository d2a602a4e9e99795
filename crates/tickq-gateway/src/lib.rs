//! tickq-gateway: HTTP API server.
//!
//! Provides:
//! - POST /api/schedules — create-or-update a named recurring schedule
//! - GET/DELETE /api/schedules/{name} — status projection and removal
//! - POST /api/tasks, GET /api/tasks/{id} — one-off task enqueue/result
//! - GET /health — HTTP health check
//!
//! The runner loop is spawned alongside the server; both share the
//! SQLite store and the handler registry.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use tickq_config::TickqConfig;
use tickq_sched::reconciler::ensure_default_schedule;
use tickq_sched::registry::{HandlerRegistry, builtin_registry};
use tickq_sched::runner::Runner;
use tickq_store::TickqStore;

/// Shared gateway state.
pub struct AppState {
    pub store: Arc<TickqStore>,
    pub registry: Arc<HandlerRegistry>,
}

/// Build the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/schedules", post(handlers::upsert_schedule))
        .route(
            "/api/schedules/{name}",
            get(handlers::schedule_status).delete(handlers::delete_schedule),
        )
        .route("/api/tasks", post(handlers::enqueue_task))
        .route("/api/tasks/{id}", get(handlers::task_result))
        .with_state(state)
}

/// Start the gateway server and the runner loop.
///
/// This is the main entry point: it opens the store, reconciles the
/// default schedule when configured to, spawns the runner, and serves
/// the HTTP API until the process exits.
pub async fn start_gateway(
    config: TickqConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = port_override.unwrap_or(config.gateway.port);
    let host = config.gateway.host.clone();

    let db_path = config.resolve_db_path()?;
    let store = Arc::new(TickqStore::open(&db_path)?);
    let registry = Arc::new(builtin_registry());

    // Explicit startup reconciliation, gated by config.
    match ensure_default_schedule(&store, &config.scheduler).await {
        Ok(Some(outcome)) => {
            info!(
                schedule_id = outcome.schedule_id,
                "Default schedule in place"
            )
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not auto-create default schedule: {e}"),
    }

    let runner = Arc::new(Runner::new(
        store.clone(),
        registry.clone(),
        Duration::from_millis(config.scheduler.tick_ms),
    ));
    tokio::spawn(runner.run());

    let state = Arc::new(AppState { store, registry });
    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Gateway listening on {addr}");
    info!("  Schedules: http://{addr}/api/schedules");
    info!("  Tasks:     http://{addr}/api/tasks");
    info!("  Health:    http://{addr}/health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
