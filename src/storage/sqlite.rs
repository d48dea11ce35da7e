//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::OutputRecord;
use crate::state::{CrawlTask, Priority, QueuedTask, RequestState, Role, StopMarker};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    CheckpointStore, Frontier, OutputSink, Storage, StorageError, StorageResult,
};
use crate::storage::{RequestRecord, RunRecord, RunStatus};
use crate::SweepError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const REQUEST_COLUMNS: &str =
    "id, url, role, stop_marker, state, retry_count, error_messages, added_at, handled_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SweepError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SweepError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SweepError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RunStatus::Running),
        })
    }

    fn request_from_row(row: &Row) -> rusqlite::Result<RequestRecord> {
        let role_str: String = row.get(2)?;
        let role = Role::from_db_string(&role_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                Box::new(StorageError::Serialization(format!(
                    "unknown role '{}'",
                    role_str
                ))),
            )
        })?;
        let stop_marker: Option<String> = row.get(3)?;
        let error_messages: String = row.get(6)?;

        Ok(RequestRecord {
            id: row.get(0)?,
            task: CrawlTask {
                url: row.get(1)?,
                role,
                stop_marker: stop_marker.and_then(StopMarker::new),
            },
            state: RequestState::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RequestState::Pending),
            retry_count: row.get(5)?,
            error_messages: serde_json::from_str(&error_messages).unwrap_or_default(),
            added_at: row.get(7)?,
            handled_at: row.get(8)?,
        })
    }
}

impl Frontier for SqliteStorage {
    fn add_request(&mut self, task: &CrawlTask, priority: Priority) -> StorageResult<bool> {
        let order_key_sql = match priority {
            Priority::High => "(SELECT COALESCE(MIN(order_key), 0) - 1 FROM requests)",
            Priority::Normal => "(SELECT COALESCE(MAX(order_key), 0) + 1 FROM requests)",
        };
        let sql = format!(
            "INSERT OR IGNORE INTO requests (url, role, stop_marker, order_key, state, added_at)
             VALUES (?1, ?2, ?3, {}, ?4, ?5)",
            order_key_sql
        );

        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            &sql,
            params![
                task.url,
                task.role.to_db_string(),
                task.stop_marker.as_ref().map(|m| m.as_str()),
                RequestState::Pending.to_db_string(),
                now
            ],
        )?;

        Ok(inserted > 0)
    }

    fn fetch_next_request(&mut self) -> StorageResult<Option<QueuedTask>> {
        let tx = self.conn.transaction()?;

        let record = tx
            .query_row(
                &format!(
                    "SELECT {} FROM requests WHERE state = ?1 ORDER BY order_key LIMIT 1",
                    REQUEST_COLUMNS
                ),
                params![RequestState::Pending.to_db_string()],
                Self::request_from_row,
            )
            .optional()?;

        let Some(record) = record else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE requests SET state = ?1 WHERE id = ?2",
            params![RequestState::InProgress.to_db_string(), record.id],
        )?;
        tx.commit()?;

        Ok(Some(QueuedTask {
            id: record.id,
            task: record.task,
            retry_count: record.retry_count,
            error_messages: record.error_messages,
        }))
    }

    fn mark_handled(&mut self, request_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE requests SET state = ?1, handled_at = ?2 WHERE id = ?3",
            params![RequestState::Handled.to_db_string(), now, request_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RequestNotFound(request_id));
        }
        Ok(())
    }

    fn reclaim_or_fail(
        &mut self,
        request_id: i64,
        error: &str,
        max_retries: u32,
    ) -> StorageResult<RequestState> {
        let (retry_count, error_messages): (u32, String) = self
            .conn
            .query_row(
                "SELECT retry_count, error_messages FROM requests WHERE id = ?1",
                params![request_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StorageError::RequestNotFound(request_id))?;

        let mut messages: Vec<String> = serde_json::from_str(&error_messages).unwrap_or_default();
        messages.push(error.to_string());
        let messages = serde_json::to_string(&messages)?;

        if retry_count < max_retries {
            self.conn.execute(
                "UPDATE requests SET state = ?1, retry_count = ?2, error_messages = ?3 WHERE id = ?4",
                params![
                    RequestState::Pending.to_db_string(),
                    retry_count + 1,
                    messages,
                    request_id
                ],
            )?;
            Ok(RequestState::Pending)
        } else {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "UPDATE requests SET state = ?1, error_messages = ?2, handled_at = ?3 WHERE id = ?4",
                params![RequestState::Failed.to_db_string(), messages, now, request_id],
            )?;
            Ok(RequestState::Failed)
        }
    }

    fn reclaim_in_progress(&mut self) -> StorageResult<usize> {
        let reclaimed = self.conn.execute(
            "UPDATE requests SET state = ?1 WHERE state = ?2",
            params![
                RequestState::Pending.to_db_string(),
                RequestState::InProgress.to_db_string()
            ],
        )?;
        Ok(reclaimed)
    }

    fn get_request_by_url(&self, url: &str) -> StorageResult<Option<RequestRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM requests WHERE url = ?1", REQUEST_COLUMNS),
                params![url],
                Self::request_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn count_by_state(&self, state: RequestState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_by_role(&self, role: Role) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE role = ?1",
            params![role.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn clear_requests(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM requests", [])?;
        Ok(())
    }
}

impl CheckpointStore for SqliteStorage {
    fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM key_value_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_value(&mut self, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO key_value_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    fn delete_value(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM key_value_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl OutputSink for SqliteStorage {
    fn push_record(
        &mut self,
        run_id: i64,
        url: &str,
        record: &OutputRecord,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO dataset (url, record, run_id, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET
                record = excluded.record,
                run_id = excluded.run_id,
                created_at = excluded.created_at",
            params![url, record.to_json_string()?, run_id, now],
        )?;
        Ok(())
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dataset", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn load_records(&self) -> StorageResult<Vec<serde_json::Value>> {
        let mut stmt = self.conn.prepare("SELECT record FROM dataset ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StorageError::from))
            .collect()
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }
}
