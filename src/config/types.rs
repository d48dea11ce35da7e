use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Catalog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    pub output: OutputConfig,
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<StartUrl>,
    #[serde(default)]
    pub extension: Option<ExtensionConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of workers the pool starts with and falls back to
    #[serde(rename = "min-concurrency", default = "default_min_concurrency")]
    pub min_concurrency: u32,

    /// Upper bound on concurrently handled pages
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// How many times a failed page is retried before it is abandoned
    #[serde(rename = "max-request-retries", default = "default_max_request_retries")]
    pub max_request_retries: u32,

    /// Per-page processing timeout (seconds)
    #[serde(
        rename = "handle-page-timeout-secs",
        default = "default_handle_page_timeout_secs"
    )]
    pub handle_page_timeout_secs: u64,

    /// Fixed delay before each page is fetched (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Maximum number of item-detail pages admitted; unlimited when unset
    #[serde(rename = "max-items", default)]
    pub max_items: Option<u64>,
}

fn default_min_concurrency() -> u32 {
    2
}

fn default_max_concurrency() -> u32 {
    5
}

fn default_max_request_retries() -> u32 {
    1
}

fn default_handle_page_timeout_secs() -> u64 {
    60
}

fn default_request_delay_ms() -> u64 {
    1000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
            max_request_retries: default_max_request_retries(),
            handle_page_timeout_secs: default_handle_page_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            max_items: None,
        }
    }
}

/// The catalog being crawled
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Origin that item links are resolved against; seeds outside it are skipped
    pub base_url: String,

    /// Regex matched against a seed's path to recognise item-detail pages
    #[serde(default = "default_item_url_pattern")]
    pub item_url_pattern: String,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_item_url_pattern() -> String {
    r"\d+.aspx".to_string()
}

/// CSS selectors used on listing and item-detail pages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SelectorConfig {
    /// Item links on a listing page
    pub item_link: String,

    /// Attribute of an item link holding the item identifier
    pub item_id_attribute: String,

    /// Display name; text of every match is concatenated
    pub name: String,

    /// Item identifier; read from the `content` attribute
    pub item_id: String,

    /// Original price text
    pub price: String,

    /// Color; read from the `content` attribute
    pub color: String,

    /// Size options; the first match is a placeholder prompt
    pub size_option: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item_link: "a[itemprop=itemListElement]".to_string(),
            item_id_attribute: "itemid".to_string(),
            name: "span[itemprop=name]".to_string(),
            item_id: "[itemprop=productID]".to_string(),
            price: r#"[aria-label="[Product information]"] [data-tstid="priceInfo-original"]"#
                .to_string(),
            color: "[itemprop=color]".to_string(),
            size_option: r#"[aria-label="[Product information]"] select option"#.to_string(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Proxy settings handed to the HTTP client as-is
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding the frontier, checkpoint and dataset
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A seed URL
#[derive(Debug, Clone, Deserialize)]
pub struct StartUrl {
    pub url: String,
}

/// Declarative output extension: extra record fields read with CSS selectors
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
}

/// How a single extension field is read from an item-detail page
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRule {
    pub selector: String,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attribute: Option<String>,

    /// Collect every match into an array instead of taking the first
    #[serde(default)]
    pub all: bool,
}
