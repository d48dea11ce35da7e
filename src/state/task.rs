//! Crawl task definitions
//!
//! A task's `Role` decides which branch of the page classifier handles it.

use std::fmt;

/// The declared role of a page in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// First page of a listing (a seed)
    ListingRoot,

    /// Subsequent page of a listing, carries the chain's stop marker
    ListingPage,

    /// Item-detail page; terminal, produces one output record
    ItemDetail,
}

impl Role {
    /// Returns true for the two listing roles
    pub fn is_listing(&self) -> bool {
        matches!(self, Self::ListingRoot | Self::ListingPage)
    }

    /// Converts the role to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::ListingRoot => "listing-root",
            Self::ListingPage => "listing-page",
            Self::ItemDetail => "item-detail",
        }
    }

    /// Parses a role from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "listing-root" => Some(Self::ListingRoot),
            "listing-page" => Some(Self::ListingPage),
            "item-detail" => Some(Self::ItemDetail),
            _ => None,
        }
    }

    /// Returns all roles
    pub fn all_roles() -> Vec<Self> {
        vec![Self::ListingRoot, Self::ListingPage, Self::ItemDetail]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Where a new task is inserted into the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Front of the queue, served before any queued `Normal` task
    High,

    /// Back of the queue
    Normal,
}

/// Identifier of the first item seen at the origin of a listing chain
///
/// A listing page that meets this identifier again has wrapped around to
/// content the chain already enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopMarker(String);

impl StopMarker {
    /// Builds a marker from an item identifier; empty identifiers carry no marker
    pub fn new(item_id: impl Into<String>) -> Option<Self> {
        let item_id = item_id.into();
        if item_id.is_empty() {
            None
        } else {
            Some(Self(item_id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the given item identifier is this marker
    pub fn matches(&self, item_id: &str) -> bool {
        self.0 == item_id
    }
}

impl fmt::Display for StopMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub role: Role,
    pub stop_marker: Option<StopMarker>,
}

impl CrawlTask {
    pub fn listing_root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            role: Role::ListingRoot,
            stop_marker: None,
        }
    }

    pub fn listing_page(url: impl Into<String>, stop_marker: Option<StopMarker>) -> Self {
        Self {
            url: url.into(),
            role: Role::ListingPage,
            stop_marker,
        }
    }

    pub fn item_detail(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            role: Role::ItemDetail,
            stop_marker: None,
        }
    }
}

/// A task as delivered by the frontier to a worker
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// Frontier request ID
    pub id: i64,

    pub task: CrawlTask,

    /// Number of failed attempts so far
    pub retry_count: u32,

    /// Error messages from previous failed attempts
    pub error_messages: Vec<String>,
}

impl QueuedTask {
    pub fn url(&self) -> &str {
        &self.task.url
    }

    pub fn role(&self) -> Role {
        self.task.role
    }
}
