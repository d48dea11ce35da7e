//! State module for crawl tasks and their bookkeeping
//!
//! # Components
//!
//! - `Role`: What a task's page is (listing root, listing page, item detail)
//! - `CrawlTask`: A unit of work handed to the frontier
//! - `StopMarker`: Pagination loop-back sentinel carried by listing pages
//! - `RequestState`: Where a task is in the frontier's lifecycle

mod request_state;
mod task;

// Re-export main types
pub use request_state::RequestState;
pub use task::{CrawlTask, Priority, QueuedTask, Role, StopMarker};
