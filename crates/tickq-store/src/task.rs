//! One-off task table operations.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};

use tickq_types::TaskStatus;

use crate::{Result, StoreError, TaskRecord, TickqStore};

const TASK_COLUMNS: &str = "id, target, args, status, result, created_at, finished_at";

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        target: row.get(1)?,
        args: serde_json::from_str(&row.get::<_, String>(2)?)
            .unwrap_or(serde_json::Value::Null),
        status: TaskStatus::parse(&row.get::<_, String>(3)?).unwrap_or(TaskStatus::Failure),
        result: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
        finished_at: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| s.parse().ok()),
    })
}

impl TickqStore {
    /// Enqueue a one-off task in `queued` state.
    pub async fn enqueue_task(
        &self,
        id: &str,
        target: &str,
        args: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let target = target.to_string();
        let args = args.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO tasks (id, target, args, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    target,
                    args,
                    TaskStatus::Queued.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    /// Get a task by id.
    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            let result = stmt
                .query_row(rusqlite::params![id], map_task_row)
                .optional()?;
            Ok(result)
        })
        .await?
    }

    /// Claim all queued tasks, atomically marking them `running`.
    ///
    /// Returned rows carry the `running` status so a crashed runner
    /// leaves them visibly incomplete rather than silently re-queued.
    pub async fn claim_queued_tasks(&self) -> Result<Vec<TaskRecord>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1 ORDER BY created_at"
            ))?;
            let mut rows = stmt
                .query_map(rusqlite::params![TaskStatus::Queued.as_str()], map_task_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for row in &mut rows {
                conn.execute(
                    "UPDATE tasks SET status = ?1 WHERE id = ?2",
                    rusqlite::params![TaskStatus::Running.as_str(), row.id],
                )?;
                row.status = TaskStatus::Running;
            }
            Ok(rows)
        })
        .await?
    }

    /// Record the terminal outcome of a task.
    pub async fn complete_task(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<&serde_json::Value>,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let result = result.map(|v| v.to_string());
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute(
                "UPDATE tasks SET status = ?1, result = ?2, finished_at = ?3 WHERE id = ?4",
                rusqlite::params![status.as_str(), result, finished_at.to_rfc3339(), id],
            )?;
            if count == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_get() {
        let store = TickqStore::open_in_memory().unwrap();
        store
            .enqueue_task("t-1", "sample", &json!({"message": "hi"}))
            .await
            .unwrap();

        let task = store.get_task("t-1").await.unwrap().unwrap();
        assert_eq!(task.target, "sample");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.args["message"], "hi");
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_get_task_not_found() {
        let store = TickqStore::open_in_memory().unwrap();
        assert!(store.get_task("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_marks_running() {
        let store = TickqStore::open_in_memory().unwrap();
        store.enqueue_task("t-1", "sample", &json!({})).await.unwrap();
        store.enqueue_task("t-2", "sample", &json!({})).await.unwrap();

        let claimed = store.claim_queued_tasks().await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert!(claimed.iter().all(|t| t.status == TaskStatus::Running));

        // A second claim finds nothing queued.
        assert!(store.claim_queued_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_task() {
        let store = TickqStore::open_in_memory().unwrap();
        store.enqueue_task("t-1", "sample", &json!({})).await.unwrap();
        store.claim_queued_tasks().await.unwrap();

        let result = json!({"status": "completed"});
        store
            .complete_task("t-1", TaskStatus::Success, Some(&result), Utc::now())
            .await
            .unwrap();

        let task = store.get_task("t-1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.result.unwrap()["status"], "completed");
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_complete_unknown_task_fails() {
        let store = TickqStore::open_in_memory().unwrap();
        let err = store
            .complete_task("missing", TaskStatus::Success, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
