//! Schedule table operations.

use rusqlite::{OptionalExtension, Row};

use tickq_types::{IntervalUnit, ScheduleSpec};

use crate::{Result, ScheduleDefinition, StoreError, TickqStore};

const SCHEDULE_COLUMNS: &str =
    "id, name, target, interval_unit, interval_value, repeats, next_run, last_run, success_count";

fn map_schedule_row(row: &Row<'_>) -> rusqlite::Result<ScheduleDefinition> {
    Ok(ScheduleDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        target: row.get(2)?,
        interval_unit: IntervalUnit::parse(&row.get::<_, String>(3)?).unwrap_or_default(),
        interval_value: row.get(4)?,
        repeats: row.get(5)?,
        next_run: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| s.parse().ok()),
        last_run: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| s.parse().ok()),
        success_count: row.get(8)?,
    })
}

impl TickqStore {
    /// Insert a brand-new schedule and return its assigned id.
    ///
    /// Fails with [`StoreError::Conflict`] when a schedule with the same
    /// name already exists; the unique index on `name` is the
    /// authoritative guard against concurrent creates.
    pub async fn insert_schedule(&self, spec: &ScheduleSpec) -> Result<i64> {
        let conn = self.conn.clone();
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let inserted = conn.execute(
                "INSERT INTO schedules (name, target, interval_unit, interval_value, repeats, success_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                rusqlite::params![
                    spec.name,
                    spec.target,
                    spec.interval_unit.as_str(),
                    spec.interval_value,
                    spec.repeats,
                ],
            );
            match inserted {
                Ok(_) => Ok(conn.last_insert_rowid()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict(spec.name))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?
    }

    /// Overwrite the mutable fields of an existing schedule row.
    ///
    /// Fails with [`StoreError::NotFound`] when the row no longer exists.
    pub async fn update_schedule(&self, def: &ScheduleDefinition) -> Result<()> {
        let conn = self.conn.clone();
        let def = def.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute(
                "UPDATE schedules
                 SET target = ?1, interval_unit = ?2, interval_value = ?3, repeats = ?4,
                     next_run = ?5, last_run = ?6, success_count = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    def.target,
                    def.interval_unit.as_str(),
                    def.interval_value,
                    def.repeats,
                    def.next_run.map(|t| t.to_rfc3339()),
                    def.last_run.map(|t| t.to_rfc3339()),
                    def.success_count,
                    def.id,
                ],
            )?;
            if count == 0 {
                return Err(StoreError::NotFound(format!("schedule id {}", def.id)));
            }
            Ok(())
        })
        .await?
    }

    /// Overwrite only the desired-definition columns of an existing row.
    ///
    /// The runner-owned columns (`next_run`, `last_run`, `success_count`)
    /// are never written here, so a reconcile cannot clobber execution
    /// history recorded after the caller's lookup. Fails with
    /// [`StoreError::NotFound`] when the row no longer exists.
    pub async fn update_schedule_spec(&self, id: i64, spec: &ScheduleSpec) -> Result<()> {
        let conn = self.conn.clone();
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute(
                "UPDATE schedules
                 SET target = ?1, interval_unit = ?2, interval_value = ?3, repeats = ?4
                 WHERE id = ?5",
                rusqlite::params![
                    spec.target,
                    spec.interval_unit.as_str(),
                    spec.interval_value,
                    spec.repeats,
                    id,
                ],
            )?;
            if count == 0 {
                return Err(StoreError::NotFound(format!("schedule id {id}")));
            }
            Ok(())
        })
        .await?
    }

    /// Look up a schedule by name.
    pub async fn find_schedule(&self, name: &str) -> Result<Option<ScheduleDefinition>> {
        let conn = self.conn.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE name = ?1"
            ))?;
            let result = stmt
                .query_row(rusqlite::params![name], map_schedule_row)
                .optional()?;
            Ok(result)
        })
        .await?
    }

    /// Get a schedule by id. Fails with [`StoreError::NotFound`] when absent.
    ///
    /// A freshly inserted row may still have `next_run` unset; the runner
    /// populates it on its next tick.
    pub async fn get_schedule(&self, id: i64) -> Result<ScheduleDefinition> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"
            ))?;
            let result = stmt
                .query_row(rusqlite::params![id], map_schedule_row)
                .optional()?;
            result.ok_or_else(|| StoreError::NotFound(format!("schedule id {id}")))
        })
        .await?
    }

    /// Delete a schedule by name. Returns whether a row existed.
    pub async fn delete_schedule(&self, name: &str) -> Result<bool> {
        let conn = self.conn.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute(
                "DELETE FROM schedules WHERE name = ?1",
                rusqlite::params![name],
            )?;
            Ok(count > 0)
        })
        .await?
    }

    /// Active schedules that are due at `now`.
    ///
    /// A schedule is due when it has executions left (`repeats != 0`) and
    /// `next_run` is unset (never fired) or in the past.
    pub async fn due_schedules(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<ScheduleDefinition>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules
                 WHERE repeats != 0 AND (next_run IS NULL OR next_run <= ?1)
                 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![now.to_rfc3339()], map_schedule_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use tickq_types::IntervalUnit;

    use super::*;

    fn spec(name: &str) -> ScheduleSpec {
        ScheduleSpec {
            name: name.into(),
            target: "heartbeat".into(),
            interval_unit: IntervalUnit::Seconds,
            interval_value: 5,
            repeats: -1,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = TickqStore::open_in_memory().unwrap();
        let id = store.insert_schedule(&spec("hb")).await.unwrap();

        let found = store.find_schedule("hb").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.target, "heartbeat");
        assert_eq!(found.success_count, 0);
        assert!(found.next_run.is_none());
        assert!(found.last_run.is_none());
    }

    #[tokio::test]
    async fn test_find_absent() {
        let store = TickqStore::open_in_memory().unwrap();
        assert!(store.find_schedule("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_name_conflicts() {
        let store = TickqStore::open_in_memory().unwrap();
        store.insert_schedule(&spec("hb")).await.unwrap();

        let err = store.insert_schedule(&spec("hb")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(name) if name == "hb"));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let store = TickqStore::open_in_memory().unwrap();
        let err = store.get_schedule(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_preserves_identity() {
        let store = TickqStore::open_in_memory().unwrap();
        let id = store.insert_schedule(&spec("hb")).await.unwrap();

        let mut def = store.get_schedule(id).await.unwrap();
        def.interval_value = 30;
        def.success_count = 7;
        def.last_run = Some(chrono::Utc::now());
        store.update_schedule(&def).await.unwrap();

        let reloaded = store.find_schedule("hb").await.unwrap().unwrap();
        assert_eq!(reloaded.id, id);
        assert_eq!(reloaded.interval_value, 30);
        assert_eq!(reloaded.success_count, 7);
        assert!(reloaded.last_run.is_some());
    }

    #[tokio::test]
    async fn test_update_spec_leaves_runner_columns_alone() {
        let store = TickqStore::open_in_memory().unwrap();
        let id = store.insert_schedule(&spec("hb")).await.unwrap();

        // Runner activity lands on the row first.
        let mut def = store.get_schedule(id).await.unwrap();
        def.success_count = 6;
        def.last_run = Some(chrono::Utc::now());
        def.next_run = Some(chrono::Utc::now() + chrono::Duration::seconds(5));
        store.update_schedule(&def).await.unwrap();

        let mut changed = spec("hb");
        changed.interval_value = 30;
        changed.repeats = 10;
        store.update_schedule_spec(id, &changed).await.unwrap();

        let reloaded = store.get_schedule(id).await.unwrap();
        assert_eq!(reloaded.interval_value, 30);
        assert_eq!(reloaded.repeats, 10);
        assert_eq!(reloaded.success_count, 6);
        assert_eq!(reloaded.last_run, def.last_run);
        assert_eq!(reloaded.next_run, def.next_run);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = TickqStore::open_in_memory().unwrap();
        let id = store.insert_schedule(&spec("hb")).await.unwrap();
        let def = store.get_schedule(id).await.unwrap();
        store.delete_schedule("hb").await.unwrap();

        let err = store.update_schedule(&def).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store.update_schedule_spec(id, &spec("hb")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = TickqStore::open_in_memory().unwrap();
        store.insert_schedule(&spec("hb")).await.unwrap();

        assert!(store.delete_schedule("hb").await.unwrap());
        assert!(!store.delete_schedule("hb").await.unwrap());
        assert!(store.find_schedule("hb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_schedules() {
        let store = TickqStore::open_in_memory().unwrap();
        let now = chrono::Utc::now();

        // Never fired: due immediately.
        let id = store.insert_schedule(&spec("fresh")).await.unwrap();

        // Fired recently, next run in the future: not due.
        let future_id = store.insert_schedule(&spec("later")).await.unwrap();
        let mut later = store.get_schedule(future_id).await.unwrap();
        later.next_run = Some(now + chrono::Duration::seconds(60));
        store.update_schedule(&later).await.unwrap();

        // Exhausted: never due.
        let done_id = store.insert_schedule(&spec("done")).await.unwrap();
        let mut done = store.get_schedule(done_id).await.unwrap();
        done.repeats = 0;
        store.update_schedule(&done).await.unwrap();

        let due = store.due_schedules(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
    }
}
