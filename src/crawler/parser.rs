//! HTML selectors for listing and item-detail pages
//!
//! This module compiles the configured CSS selectors once and extracts
//! item links from listing pages.

use crate::config::SelectorConfig;
use crate::url::CatalogSite;
use crate::ConfigError;
use scraper::{Html, Selector};

/// Compiled catalog selectors
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    pub item_link: Selector,
    pub item_id_attribute: String,
    pub name: Selector,
    pub item_id: Selector,
    pub price: Selector,
    pub color: Selector,
    pub size_option: Selector,
}

impl CatalogSelectors {
    /// Compiles every selector in the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CatalogSelectors)` - All selectors compiled
    /// * `Err(ConfigError::InvalidPattern)` - A selector failed to parse
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        if config.item_id_attribute.trim().is_empty() {
            return Err(ConfigError::Validation(
                "item-id-attribute cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            item_link: parse_selector("item-link", &config.item_link)?,
            item_id_attribute: config.item_id_attribute.clone(),
            name: parse_selector("name", &config.name)?,
            item_id: parse_selector("item-id", &config.item_id)?,
            price: parse_selector("price", &config.price)?,
            color: parse_selector("color", &config.color)?,
            size_option: parse_selector("size-option", &config.size_option)?,
        })
    }
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| {
        ConfigError::InvalidPattern(format!("selector {} '{}': {:?}", field, selector, e))
    })
}

/// An item link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLink {
    /// Value of the item identifier attribute; empty when missing
    pub item_id: String,

    /// Absolute item URL, None when the href is missing or unusable
    pub url: Option<String>,
}

/// Extracts item links from a listing page in document order
pub fn extract_item_links(
    document: &Html,
    selectors: &CatalogSelectors,
    site: &CatalogSite,
) -> Vec<ItemLink> {
    document
        .select(&selectors.item_link)
        .map(|element| {
            let item_id = element
                .value()
                .attr(&selectors.item_id_attribute)
                .unwrap_or_default()
                .to_string();
            let url = element
                .value()
                .attr("href")
                .and_then(|href| site.resolve(href));

            ItemLink { item_id, url }
        })
        .collect()
}
