//! Scheduler for the worker pool
//!
//! This module handles:
//! - Adaptive concurrency between the configured minimum and maximum
//! - Tracking how many pages are in flight
//! - The fixed delay and timeout applied to every page

use crate::config::CrawlerConfig;
use std::time::Duration;

/// Decides how many pages may be handled at once
///
/// The desired concurrency starts at the minimum, grows by one after each
/// successful page up to the maximum, and falls back to the minimum after a
/// failure.
#[derive(Debug)]
pub struct Scheduler {
    min_concurrency: usize,
    max_concurrency: usize,

    /// Current concurrency target
    desired: usize,

    /// Pages currently being handled
    in_flight: usize,

    request_delay: Duration,
    page_timeout: Duration,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        let min_concurrency = config.min_concurrency.max(1) as usize;
        let max_concurrency = (config.max_concurrency as usize).max(min_concurrency);

        Self {
            min_concurrency,
            max_concurrency,
            desired: min_concurrency,
            in_flight: 0,
            request_delay: Duration::from_millis(config.request_delay_ms),
            page_timeout: Duration::from_secs(config.handle_page_timeout_secs),
        }
    }

    /// Returns true if another page may be started
    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.desired
    }

    /// Records that a page was started
    pub fn task_started(&mut self) {
        self.in_flight += 1;
    }

    /// Records that a page finished and adjusts the concurrency target
    pub fn task_finished(&mut self, success: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if success {
            if self.desired < self.max_concurrency {
                self.desired += 1;
                tracing::trace!("Concurrency raised to {}", self.desired);
            }
        } else if self.desired != self.min_concurrency {
            self.desired = self.min_concurrency;
            tracing::debug!("Concurrency reset to {}", self.desired);
        }
    }

    /// Forgets every in-flight page (after the pool was aborted)
    pub fn reset(&mut self) {
        self.in_flight = 0;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    pub fn desired_concurrency(&self) -> usize {
        self.desired
    }

    /// Delay applied before each page is fetched
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Upper bound on handling a single page
    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }
}
