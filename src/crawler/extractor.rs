//! Item-detail record extraction
//!
//! Missing page elements never fail extraction: text fields come back empty,
//! attribute fields come back as `None`.

use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::CatalogSelectors;
use crate::extension::{json_type_name, OutputExtension};
use crate::output::{ItemDetails, OutputRecord, RequestDebugInfo};
use crate::state::QueuedTask;
use crate::SweepError;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::Arc;

/// Builds output records from item-detail pages
#[derive(Clone)]
pub struct RecordExtractor {
    selectors: CatalogSelectors,
    extension: Option<Arc<dyn OutputExtension>>,
}

impl RecordExtractor {
    pub fn new(selectors: CatalogSelectors, extension: Option<Arc<dyn OutputExtension>>) -> Self {
        Self {
            selectors,
            extension,
        }
    }

    /// Reads the base item fields
    pub fn extract_details(&self, document: &Html) -> ItemDetails {
        let sizes = document
            .select(&self.selectors.size_option)
            .skip(1)
            .map(|option| option.text().collect::<String>().trim().to_string())
            .collect();

        ItemDetails {
            name: all_text(document, &self.selectors.name),
            item_id: first_content(document, &self.selectors.item_id),
            color: first_content(document, &self.selectors.color),
            sizes,
            price: all_text(document, &self.selectors.price),
        }
    }

    /// Builds the record for an item-detail page
    ///
    /// # Returns
    ///
    /// * `Ok(OutputRecord)` - Base fields with any extension fields merged over them
    /// * `Err(SweepError::ExtensionContract)` - The extension returned something
    ///   other than a JSON object
    pub fn extract(
        &self,
        queued: &QueuedTask,
        page: &FetchedPage,
        document: &Html,
    ) -> Result<OutputRecord, SweepError> {
        let debug = RequestDebugInfo {
            request_id: queued.id,
            url: queued.task.url.clone(),
            loaded_url: page.loaded_url.clone(),
            method: "GET".to_string(),
            retry_count: queued.retry_count,
            error_messages: queued.error_messages.clone(),
            status_code: page.status_code,
        };
        let record = OutputRecord::new(&queued.task.url, self.extract_details(document), debug);

        let Some(extension) = &self.extension else {
            return Ok(record);
        };

        match extension.extend(document) {
            Value::Object(extra) => Ok(record.with_extension(extra)),
            other => {
                tracing::error!("Output extension has to return an object");
                Err(SweepError::ExtensionContract {
                    url: queued.task.url.clone(),
                    found: json_type_name(&other).to_string(),
                })
            }
        }
    }
}

fn all_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn first_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::to_string)
}
