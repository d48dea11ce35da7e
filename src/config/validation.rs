use crate::config::types::{
    Config, CrawlerConfig, ExtensionConfig, OutputConfig, ProxyConfig, SiteConfig, StartUrl,
    UserAgentConfig,
};
use crate::crawler::CatalogSelectors;
use crate::extension::SelectorExtension;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_start_urls(&config.start_urls)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy_config(proxy)?;
    }
    if let Some(extension) = &config.extension {
        validate_extension_config(extension)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "min_concurrency must be >= 1, got {}",
            config.min_concurrency
        )));
    }

    if config.max_concurrency < config.min_concurrency || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between min_concurrency ({}) and 100, got {}",
            config.min_concurrency, config.max_concurrency
        )));
    }

    if config.handle_page_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "handle_page_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_items == Some(0) {
        return Err(ConfigError::Validation(
            "max_items must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the catalog site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    Regex::new(&config.item_url_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!(
            "item_url_pattern '{}': {}",
            config.item_url_pattern, e
        ))
    })?;

    CatalogSelectors::compile(&config.selectors)?;

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the seed URLs
fn validate_start_urls(start_urls: &[StartUrl]) -> Result<(), ConfigError> {
    if start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "Invalid input, it needs to contain at least one url in 'start-urls'".to_string(),
        ));
    }

    for entry in start_urls {
        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Start URL '{}' must use http or https",
                entry.url
            )));
        }
    }

    Ok(())
}

/// Validates the proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy url: {}", e)))?;
    Ok(())
}

/// Validates the output extension by building it
fn validate_extension_config(config: &ExtensionConfig) -> Result<(), ConfigError> {
    SelectorExtension::from_config(config)?;
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
