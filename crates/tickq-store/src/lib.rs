//! tickq-store: SQLite-based persistence for schedules and tasks.
//!
//! Holds the named recurring schedule definitions consumed by the runner
//! and the one-off task rows with their execution results. All access
//! goes through `spawn_blocking` around a shared connection.

pub mod schedule;
pub mod task;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use tickq_types::{IntervalUnit, TaskStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Schedule name already exists: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A persisted named recurring schedule.
///
/// `next_run`, `last_run` and `success_count` are runner-owned: the
/// reconciler never touches them after creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScheduleDefinition {
    pub id: i64,
    pub name: String,
    pub target: String,
    pub interval_unit: IntervalUnit,
    pub interval_value: i64,
    /// -1 = run forever, 0 = exhausted, N > 0 = N remaining executions.
    pub repeats: i64,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub success_count: i64,
}

impl ScheduleDefinition {
    /// Cadence normalized to seconds. Saturates rather than overflows.
    pub fn interval_secs(&self) -> i64 {
        self.interval_value
            .saturating_mul(self.interval_unit.seconds_per_unit())
    }
}

/// A persisted one-off task submission.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub target: String,
    pub args: serde_json::Value,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

const SCHEMA: &str = "PRAGMA journal_mode = WAL;

     CREATE TABLE IF NOT EXISTS schedules (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         name TEXT NOT NULL UNIQUE,
         target TEXT NOT NULL,
         interval_unit TEXT NOT NULL,
         interval_value INTEGER NOT NULL,
         repeats INTEGER NOT NULL,
         next_run TEXT,
         last_run TEXT,
         success_count INTEGER NOT NULL DEFAULT 0
     );

     CREATE TABLE IF NOT EXISTS tasks (
         id TEXT PRIMARY KEY,
         target TEXT NOT NULL,
         args TEXT NOT NULL,
         status TEXT NOT NULL,
         result TEXT,
         created_at TEXT NOT NULL,
         finished_at TEXT
     );";

/// SQLite-based storage for tickq schedules and tasks.
pub struct TickqStore {
    conn: Arc<Mutex<Connection>>,
}

impl TickqStore {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Store opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickq.db");
        let _store = TickqStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickq.db");
        drop(TickqStore::open(&path).unwrap());
        // Re-opening must not fail on existing tables.
        let _store = TickqStore::open(&path).unwrap();
    }
}
