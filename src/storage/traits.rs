//! Storage traits and error types
//!
//! The crawl controller talks to three collaborators: a deduplicating
//! priority frontier, a small key-value checkpoint store, and an append-only
//! output sink. `Storage` bundles them with run bookkeeping.

use crate::output::OutputRecord;
use crate::state::{CrawlTask, Priority, QueuedTask, RequestState, Role};
use crate::storage::{RequestRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Request not found: {0}")]
    RequestNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, URL-deduplicating work queue with front-of-queue insertion
pub trait Frontier {
    /// Adds a task to the frontier
    ///
    /// `Priority::High` tasks are served before every queued `Normal` task,
    /// the most recently added first.
    ///
    /// # Returns
    ///
    /// `true` if the task was added, `false` if its URL was already known
    fn add_request(&mut self, task: &CrawlTask, priority: Priority) -> StorageResult<bool>;

    /// Takes the next pending task and marks it in progress
    fn fetch_next_request(&mut self) -> StorageResult<Option<QueuedTask>>;

    /// Marks an in-progress task as handled
    fn mark_handled(&mut self, request_id: i64) -> StorageResult<()>;

    /// Records a failed attempt
    ///
    /// The task returns to the queue while it has retries left, otherwise it
    /// is abandoned.
    ///
    /// # Returns
    ///
    /// The resulting state, either `Pending` or `Failed`
    fn reclaim_or_fail(
        &mut self,
        request_id: i64,
        error: &str,
        max_retries: u32,
    ) -> StorageResult<RequestState>;

    /// Returns tasks left in progress by an interrupted process to the queue
    fn reclaim_in_progress(&mut self) -> StorageResult<usize>;

    /// Gets a request by URL
    fn get_request_by_url(&self, url: &str) -> StorageResult<Option<RequestRecord>>;

    /// Counts requests in a given state
    fn count_by_state(&self, state: RequestState) -> StorageResult<u64>;

    /// Counts requests with a given role
    fn count_by_role(&self, role: Role) -> StorageResult<u64>;

    /// Number of pending tasks
    fn pending_count(&self) -> StorageResult<u64> {
        self.count_by_state(RequestState::Pending)
    }

    /// Removes every request
    fn clear_requests(&mut self) -> StorageResult<()>;
}

/// Small named values that must survive a restart
pub trait CheckpointStore {
    fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>>;

    fn set_value(&mut self, key: &str, value: &serde_json::Value) -> StorageResult<()>;

    fn delete_value(&mut self, key: &str) -> StorageResult<()>;
}

/// Durable sink for output records
pub trait OutputSink {
    /// Stores the record for an item URL
    ///
    /// The dataset holds one record per URL; pushing a URL again replaces
    /// its record.
    fn push_record(&mut self, run_id: i64, url: &str, record: &OutputRecord) -> StorageResult<()>;

    fn count_records(&self) -> StorageResult<u64>;

    /// Loads every record in insertion order
    fn load_records(&self) -> StorageResult<Vec<serde_json::Value>>;
}

/// Storage backend used by the crawl coordinator
pub trait Storage: Frontier + CheckpointStore + OutputSink {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;
}
