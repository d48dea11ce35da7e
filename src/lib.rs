//! Catalog-Sweep: a bounded, resumable catalog crawl controller
//!
//! This crate discovers item-detail pages from a paginated catalog site and
//! turns each of them into an output record. Pagination chains stop when they
//! loop back onto already-seen items, and a global item limit is enforced
//! across process restarts through a checkpointed admission counter.

pub mod admission;
pub mod config;
pub mod crawler;
pub mod extension;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Page handling for {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Worker handling {url} panicked: {message}")]
    WorkerPanicked { url: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extension must return an object, got {found} for {url}")]
    ExtensionContract { url: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// Returns true if the error must end the whole run
    ///
    /// Fetch, HTTP, timeout and URL errors only fail the current task and are
    /// retried by the frontier. A broken extension or a broken store cannot be
    /// recovered by retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ExtensionContract { .. }
                | Self::Database(_)
                | Self::Storage(_)
                | Self::Json(_)
                | Self::Io(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid extension: {0}")]
    Extension(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use admission::{Admission, AdmissionGate};
pub use config::Config;
pub use state::{CrawlTask, Priority, RequestState, Role, StopMarker};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let contract = SweepError::ExtensionContract {
            url: "https://example.com/item-1.aspx".to_string(),
            found: "string".to_string(),
        };
        assert!(contract.is_fatal());

        let status = SweepError::HttpStatus {
            url: "https://example.com/".to_string(),
            status: 503,
        };
        assert!(!status.is_fatal());

        let timeout = SweepError::Timeout {
            url: "https://example.com/".to_string(),
            secs: 60,
        };
        assert!(!timeout.is_fatal());

        let panicked = SweepError::WorkerPanicked {
            url: "https://example.com/".to_string(),
            message: "boom".to_string(),
        };
        assert!(!panicked.is_fatal());
    }
}
