//! URL handling module for Catalog-Sweep
//!
//! This module decides which seeds belong to the catalog, whether a seed is an
//! item-detail page or a listing, resolves item links, and computes the next
//! page of a listing.

mod pagination;

use crate::config::SiteConfig;
use crate::state::Role;
use crate::ConfigError;
use regex::Regex;
use url::Url;

// Re-export main functions
pub use pagination::{next_listing_page, next_page_after_root, page_parameter, with_page};

/// The catalog site being crawled
#[derive(Debug, Clone)]
pub struct CatalogSite {
    base: Url,
    item_pattern: Regex,
}

impl CatalogSite {
    /// Builds the site matcher from configuration
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;
        let item_pattern = Regex::new(&config.item_url_pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!(
                "item_url_pattern '{}': {}",
                config.item_url_pattern, e
            ))
        })?;

        Ok(Self { base, item_pattern })
    }

    /// The catalog's base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Returns true if the URL lives under the catalog's base URL
    pub fn contains(&self, url: &Url) -> bool {
        url.origin() == self.base.origin() && url.path().starts_with(self.base.path())
    }

    /// Classifies a seed URL
    ///
    /// # Returns
    ///
    /// * `Some(Role::ItemDetail)` - The seed already points at a specific item
    /// * `Some(Role::ListingRoot)` - The seed is the first page of a listing
    /// * `None` - The seed is not part of the catalog (or does not parse)
    pub fn classify_seed(&self, seed: &str) -> Option<Role> {
        let url = Url::parse(seed).ok()?;
        if !self.contains(&url) {
            return None;
        }

        if self.item_pattern.is_match(url.path()) {
            Some(Role::ItemDetail)
        } else {
            Some(Role::ListingRoot)
        }
    }

    /// Resolves an item link href against the catalog's base URL
    ///
    /// Returns None if the link should be skipped:
    /// - empty or fragment-only hrefs
    /// - javascript:, mailto:, tel:, data: schemes
    /// - anything that does not resolve to an HTTP(S) URL
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();

        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        if href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            return None;
        }

        match self.base.join(href) {
            Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
                Some(absolute.to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;

    fn site() -> CatalogSite {
        CatalogSite::from_config(&SiteConfig {
            base_url: "https://www.farfetch.com/".to_string(),
            item_url_pattern: r"\d+.aspx".to_string(),
            selectors: SelectorConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_classify_listing_seed() {
        assert_eq!(
            site().classify_seed("https://www.farfetch.com/shopping/women/dresses-1/items.aspx"),
            Some(Role::ListingRoot)
        );
    }

    #[test]
    fn test_classify_item_seed() {
        assert_eq!(
            site().classify_seed(
                "https://www.farfetch.com/shopping/women/silk-dress-item-13246544.aspx?storeid=9359"
            ),
            Some(Role::ItemDetail)
        );
    }

    #[test]
    fn test_classify_foreign_seed() {
        assert_eq!(site().classify_seed("https://www.example.com/items.aspx"), None);
        assert_eq!(site().classify_seed("not a url"), None);
    }

    #[test]
    fn test_resolve_relative_href() {
        assert_eq!(
            site().resolve("/shopping/women/item-123.aspx"),
            Some("https://www.farfetch.com/shopping/women/item-123.aspx".to_string())
        );
    }

    #[test]
    fn test_resolve_skips_special_schemes() {
        let site = site();
        assert_eq!(site.resolve(""), None);
        assert_eq!(site.resolve("#top"), None);
        assert_eq!(site.resolve("javascript:void(0)"), None);
        assert_eq!(site.resolve("mailto:help@farfetch.com"), None);
    }
}
