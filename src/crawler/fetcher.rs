//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Routing requests through the configured proxy
//! - GET requests to fetch page content
//! - Error classification

use crate::config::{ProxyConfig, UserAgentConfig};
use crate::SweepError;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The requested URL
    pub url: String,

    /// Final URL after redirects
    pub loaded_url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Page body content
    pub body: String,
}

/// Formats the user agent string: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `proxy` - Optional proxy every request is sent through
/// * `timeout` - Overall request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (or the proxy URL was rejected)
///
/// # Example
///
/// ```no_run
/// use catalog_sweep::config::UserAgentConfig;
/// use catalog_sweep::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "catalog-sweep".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, None, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    proxy: Option<&ProxyConfig>,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(&proxy.url)?);
    }

    builder.build()
}

/// Fetches a page with a GET request
///
/// Redirects are followed; the final URL is reported as `loaded_url`.
///
/// # Returns
///
/// * `Ok(FetchedPage)` - 2xx response with its body
/// * `Err(SweepError::HttpStatus)` - Any other status code
/// * `Err(SweepError::Http)` - Connection, TLS, timeout or body errors
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, SweepError> {
    let http_error = |source: reqwest::Error| SweepError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_error)?;

    let status = response.status();
    let loaded_url = response.url().to_string();

    if !status.is_success() {
        return Err(SweepError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(http_error)?;

    Ok(FetchedPage {
        url: url.to_string(),
        loaded_url,
        status_code: status.as_u16(),
        body,
    })
}
