//! Page classifier
//!
//! Every fetched page is handled according to the role it was enqueued with:
//!
//! - **listing-root**: admits the item links found on the page, remembers the
//!   first item's identifier as the chain's stop marker, and always enqueues
//!   the next listing page.
//! - **listing-page**: admits item links until it meets the stop marker,
//!   then continues the chain with the same marker while the page parameter
//!   and the admission limit allow it.
//! - **item-detail**: produces one output record.
//!
//! The per-item loop checks the admission limit before the stop marker.

use crate::admission::{Admission, AdmissionGate};
use crate::crawler::enqueuer::Enqueuer;
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::{extract_item_links, CatalogSelectors, ItemLink};
use crate::output::OutputRecord;
use crate::state::{Priority, QueuedTask, Role, StopMarker};
use crate::url::{next_listing_page, next_page_after_root, CatalogSite};
use crate::SweepError;
use scraper::Html;
use std::sync::Arc;

/// Why a listing page stopped (or continued) its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStop {
    /// The page had no item links
    Empty,

    /// A follow-up page arrived without a stop marker
    MissingStopMarker,

    /// The page contained the chain's stop marker
    StopMarkerReached,

    /// The admission limit is reached
    LimitReached,

    /// The page URL has no numeric `page` parameter that can be incremented
    NoPageParameter,

    /// The page number is already the largest representable one
    LastPage,

    /// The next listing page was enqueued
    Continued,
}

/// Result of handling a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOutcome {
    /// Item-detail tasks newly admitted from this page
    pub items_admitted: usize,

    /// Item links the frontier already knew
    pub duplicates: usize,

    /// Next listing page, when one was enqueued
    pub next_page: Option<String>,

    pub stop: ListingStop,
}

impl ListingOutcome {
    fn with_stop(stop: ListingStop) -> Self {
        Self {
            items_admitted: 0,
            duplicates: 0,
            next_page: None,
            stop,
        }
    }

    fn count(&mut self, admission: Admission) {
        match admission {
            Admission::Admitted => self.items_admitted += 1,
            Admission::Duplicate => self.duplicates += 1,
            Admission::Denied => {}
        }
    }
}

/// Result of handling a page
#[derive(Debug, Clone)]
pub enum Outcome {
    Listing(ListingOutcome),
    Record(OutputRecord),
}

/// What happened to a single item link
enum ItemAdmission {
    Counted(Admission),
    Skipped,
}

/// Dispatches fetched pages on their role
#[derive(Clone)]
pub struct Classifier {
    site: CatalogSite,
    selectors: CatalogSelectors,
    gate: Arc<AdmissionGate>,
    enqueuer: Enqueuer,
    extractor: RecordExtractor,
}

impl Classifier {
    pub fn new(
        site: CatalogSite,
        selectors: CatalogSelectors,
        gate: Arc<AdmissionGate>,
        enqueuer: Enqueuer,
        extractor: RecordExtractor,
    ) -> Self {
        Self {
            site,
            selectors,
            gate,
            enqueuer,
            extractor,
        }
    }

    /// Handles a fetched page according to its task's role
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome::Listing)` - A listing page was processed
    /// * `Ok(Outcome::Record)` - An item-detail page produced a record
    /// * `Err(SweepError)` - Storage, URL or extension failure
    pub fn handle(&self, queued: &QueuedTask, page: &FetchedPage) -> Result<Outcome, SweepError> {
        let document = Html::parse_document(&page.body);

        match queued.role() {
            Role::ListingRoot => self
                .handle_listing_root(queued, &document)
                .map(Outcome::Listing),
            Role::ListingPage => self
                .handle_listing_page(queued, &document)
                .map(Outcome::Listing),
            Role::ItemDetail => self
                .extractor
                .extract(queued, page, &document)
                .map(Outcome::Record),
        }
    }

    fn handle_listing_root(
        &self,
        queued: &QueuedTask,
        document: &Html,
    ) -> Result<ListingOutcome, SweepError> {
        let links = extract_item_links(document, &self.selectors, &self.site);
        if links.is_empty() {
            tracing::debug!("No item links on {}", queued.url());
            return Ok(ListingOutcome::with_stop(ListingStop::Empty));
        }

        let mut outcome = ListingOutcome::with_stop(ListingStop::Continued);
        let mut stop_marker = None;

        for (index, link) in links.iter().enumerate() {
            if !self.gate.admitted() {
                break;
            }

            if index == 0 {
                stop_marker = StopMarker::new(link.item_id.as_str());
            }

            match self.admit_item(link)? {
                ItemAdmission::Counted(Admission::Denied) => break,
                ItemAdmission::Counted(admission) => outcome.count(admission),
                ItemAdmission::Skipped => {}
            }
        }

        let Some(next_page) = next_page_after_root(queued.url())? else {
            tracing::warn!("Page number of {} cannot be incremented", queued.url());
            outcome.stop = ListingStop::LastPage;
            return Ok(outcome);
        };
        match &stop_marker {
            Some(marker) => tracing::debug!("Stop marker for {} is {}", queued.url(), marker),
            None => tracing::debug!("No stop marker recorded on {}", queued.url()),
        }
        self.enqueuer
            .enqueue(&next_page, Role::ListingPage, Priority::Normal, stop_marker)?;
        outcome.next_page = Some(next_page);

        Ok(outcome)
    }

    fn handle_listing_page(
        &self,
        queued: &QueuedTask,
        document: &Html,
    ) -> Result<ListingOutcome, SweepError> {
        let links = extract_item_links(document, &self.selectors, &self.site);
        if links.is_empty() {
            tracing::debug!("No item links on {}", queued.url());
            return Ok(ListingOutcome::with_stop(ListingStop::Empty));
        }

        let Some(stop_marker) = queued.task.stop_marker.as_ref() else {
            tracing::debug!("No stop marker on {}, ending chain", queued.url());
            return Ok(ListingOutcome::with_stop(ListingStop::MissingStopMarker));
        };

        let mut outcome = ListingOutcome::with_stop(ListingStop::Continued);

        for link in &links {
            if !self.gate.admitted() {
                break;
            }

            if stop_marker.matches(&link.item_id) {
                tracing::debug!("Reached stop marker {} on {}", stop_marker, queued.url());
                outcome.stop = ListingStop::StopMarkerReached;
                return Ok(outcome);
            }

            match self.admit_item(link)? {
                ItemAdmission::Counted(Admission::Denied) => break,
                ItemAdmission::Counted(admission) => outcome.count(admission),
                ItemAdmission::Skipped => {}
            }
        }

        let Some(next_page) = next_listing_page(queued.url())? else {
            tracing::debug!("No page parameter on {}, ending chain", queued.url());
            outcome.stop = ListingStop::NoPageParameter;
            return Ok(outcome);
        };

        if !self.gate.admitted() {
            tracing::debug!("Item limit reached, ending chain at {}", queued.url());
            outcome.stop = ListingStop::LimitReached;
            return Ok(outcome);
        }

        self.enqueuer.enqueue(
            &next_page,
            Role::ListingPage,
            Priority::Normal,
            Some(stop_marker.clone()),
        )?;
        outcome.next_page = Some(next_page);

        Ok(outcome)
    }

    fn admit_item(&self, link: &ItemLink) -> Result<ItemAdmission, SweepError> {
        let Some(url) = link.url.as_deref() else {
            tracing::debug!("Skipping item link {:?} without usable href", link.item_id);
            return Ok(ItemAdmission::Skipped);
        };

        let admission = self.gate.admit(|| {
            self.enqueuer
                .enqueue(url, Role::ItemDetail, Priority::High, None)
        })?;

        Ok(ItemAdmission::Counted(admission))
    }
}
