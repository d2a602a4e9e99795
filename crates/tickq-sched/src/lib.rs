//! tickq-sched: schedule reconciliation, status reporting, and the runner.
//!
//! Provides:
//! - Reconciler: converge a desired named schedule onto exactly one
//!   stored definition (create-if-absent-else-update)
//! - Status reporter: read-only projection of a schedule for display
//! - Handler registry: string key -> executable task handler
//! - Runner: background loop executing due schedules and queued tasks

pub mod reconciler;
pub mod registry;
pub mod runner;
pub mod status;

use tickq_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// Malformed schedule definition, rejected before touching the store.
    #[error("Invalid schedule: {0}")]
    InvalidSpec(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SchedError>;
