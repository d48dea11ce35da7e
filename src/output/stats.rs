//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::admission::CHECKPOINT_KEY;
use crate::state::{RequestState, Role};
use crate::storage::{RunRecord, Storage};
use crate::SweepError;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of requests known to the frontier
    pub total_requests: u64,

    /// Count of requests by frontier state
    pub requests_by_state: BTreeMap<String, u64>,

    /// Count of requests by page role
    pub requests_by_role: BTreeMap<String, u64>,

    /// Number of records in the dataset
    pub records: u64,

    /// Last checkpointed admission counter, if any
    pub details_enqueued: Option<u64>,

    /// Most recent run
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(SweepError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, SweepError> {
    let mut requests_by_state = BTreeMap::new();
    let mut total_requests = 0;
    for state in RequestState::all_states() {
        let count = storage.count_by_state(state)?;
        total_requests += count;
        if count > 0 {
            requests_by_state.insert(state.to_string(), count);
        }
    }

    let mut requests_by_role = BTreeMap::new();
    for role in Role::all_roles() {
        let count = storage.count_by_role(role)?;
        if count > 0 {
            requests_by_role.insert(role.to_string(), count);
        }
    }

    let details_enqueued = storage
        .get_value(CHECKPOINT_KEY)?
        .and_then(|value| value.as_u64());

    Ok(CrawlStatistics {
        total_requests,
        requests_by_state,
        requests_by_role,
        records: storage.count_records()?,
        details_enqueued,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run:");
        println!("  ID: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Overview:");
    println!("  Total requests: {}", stats.total_requests);
    println!("  Records written: {}", stats.records);
    match stats.details_enqueued {
        Some(count) => println!("  Checkpointed item admissions: {}", count),
        None => println!("  Checkpointed item admissions: none"),
    }
    println!();

    println!("Requests by State:");
    for (state, count) in &stats.requests_by_state {
        let percentage = if stats.total_requests > 0 {
            (*count as f64 / stats.total_requests as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    println!("Requests by Role:");
    for (role, count) in &stats.requests_by_role {
        println!("  {}: {}", role, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CrawlTask, Priority};
    use crate::storage::{CheckpointStore, Frontier, SqliteStorage};
    use serde_json::json;

    #[test]
    fn test_load_statistics_from_empty_storage() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.records, 0);
        assert_eq!(stats.details_enqueued, None);
        assert!(stats.latest_run.is_none());
    }

    #[test]
    fn test_load_statistics_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.create_run("hash").unwrap();
        storage
            .add_request(&CrawlTask::listing_root("https://example.com/list"), Priority::Normal)
            .unwrap();
        storage
            .add_request(
                &CrawlTask::item_detail("https://example.com/item-1.aspx"),
                Priority::High,
            )
            .unwrap();
        let queued = storage.fetch_next_request().unwrap().unwrap();
        storage.mark_handled(queued.id).unwrap();
        storage.set_value(CHECKPOINT_KEY, &json!(1)).unwrap();

        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.requests_by_state.get("handled"), Some(&1));
        assert_eq!(stats.requests_by_state.get("pending"), Some(&1));
        assert_eq!(stats.requests_by_role.get("item-detail"), Some(&1));
        assert_eq!(stats.details_enqueued, Some(1));
        assert!(stats.latest_run.is_some());
    }
}
