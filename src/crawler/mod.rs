//! Crawler module for catalog page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching
//! - Listing and item-detail parsing
//! - The page classifier and its stop-marker pagination
//! - Worker pool scheduling
//! - Overall crawl coordination

mod classifier;
mod coordinator;
mod enqueuer;
mod extractor;
mod fetcher;
mod parser;
mod scheduler;

pub use classifier::{Classifier, ListingOutcome, ListingStop, Outcome};
pub use coordinator::{run_crawl, suspension_signal, Coordinator, RunOutcome};
pub use enqueuer::Enqueuer;
pub use extractor::RecordExtractor;
pub use fetcher::{build_http_client, fetch_page, user_agent_string, FetchedPage};
pub use parser::{extract_item_links, CatalogSelectors, ItemLink};
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::SweepError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Initialize the storage layer
/// 2. Resume the interrupted run or start a new one
/// 3. Seed the frontier with the start URLs
/// 4. Handle listing and item-detail pages until the frontier is drained
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
/// * `fresh` - Whether to discard previous crawl state
///
/// # Returns
///
/// * `Ok(RunOutcome)` - Crawl completed or was suspended
/// * `Err(SweepError)` - Crawl failed
pub async fn crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<RunOutcome, SweepError> {
    run_crawl(config, config_hash, fresh).await
}
