//! Frontier enqueuer shared by the classifier and the seed loop

use crate::state::{CrawlTask, Priority, Role, StopMarker};
use crate::storage::{Frontier, SqliteStorage, StorageError};
use std::sync::{Arc, Mutex};

/// Adds tasks to the shared frontier
#[derive(Clone)]
pub struct Enqueuer {
    storage: Arc<Mutex<SqliteStorage>>,
}

impl Enqueuer {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self { storage }
    }

    /// Enqueues a task
    ///
    /// `Priority::High` tasks go to the front of the queue. A URL the frontier
    /// already knows is left alone.
    ///
    /// # Returns
    ///
    /// `true` if the task was newly added
    pub fn enqueue(
        &self,
        url: &str,
        role: Role,
        priority: Priority,
        stop_marker: Option<StopMarker>,
    ) -> Result<bool, StorageError> {
        let task = CrawlTask {
            url: url.to_string(),
            role,
            stop_marker,
        };

        let added = self
            .storage
            .lock()
            .map_err(|e| StorageError::Database(format!("Failed to lock storage: {}", e)))?
            .add_request(&task, priority)?;

        if added {
            tracing::debug!("Enqueued {} {} ({:?})", role, url, priority);
        } else {
            tracing::trace!("Already known: {}", url);
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enqueuer() -> (Enqueuer, Arc<Mutex<SqliteStorage>>) {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        (Enqueuer::new(Arc::clone(&storage)), storage)
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let (enqueuer, storage) = enqueuer();
        let url = "https://example.com/dress-item-1.aspx";

        assert!(enqueuer.enqueue(url, Role::ItemDetail, Priority::High, None).unwrap());
        assert!(!enqueuer.enqueue(url, Role::ItemDetail, Priority::High, None).unwrap());

        assert_eq!(storage.lock().unwrap().pending_count().unwrap(), 1);
    }

    #[test]
    fn test_high_priority_jumps_queued_listing_pages() {
        let (enqueuer, storage) = enqueuer();
        enqueuer
            .enqueue(
                "https://example.com/items.aspx?page=2",
                Role::ListingPage,
                Priority::Normal,
                StopMarker::new("1"),
            )
            .unwrap();
        enqueuer
            .enqueue(
                "https://example.com/dress-item-2.aspx",
                Role::ItemDetail,
                Priority::High,
                None,
            )
            .unwrap();

        let next = storage.lock().unwrap().fetch_next_request().unwrap().unwrap();
        assert_eq!(next.role(), Role::ItemDetail);
    }
}
