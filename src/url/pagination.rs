//! Listing pagination through the `page` query parameter

use crate::{UrlError, UrlResult};
use url::Url;

const PAGE_PARAM: &str = "page";

/// Reads the numeric `page` query parameter
///
/// A missing or non-numeric value is treated as absent.
pub fn page_parameter(url: &Url) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Returns a copy of the URL with its `page` parameter set
///
/// Other query parameters keep their order; repeated `page` parameters
/// collapse into one and the fragment is dropped.
pub fn with_page(url: &Url, page: u64) -> Url {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;

    for (key, value) in url.query_pairs() {
        if key == PAGE_PARAM {
            if !replaced {
                pairs.push((PAGE_PARAM.to_string(), page.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }

    if !replaced {
        pairs.push((PAGE_PARAM.to_string(), page.to_string()));
    }

    let mut next = url.clone();
    next.set_fragment(None);
    next.query_pairs_mut().clear().extend_pairs(pairs);
    next
}

/// Computes the page after a listing root
///
/// The root's page parameter is incremented, defaulting to page 2 when it is
/// absent. Returns `Ok(None)` if the page number cannot be incremented.
pub fn next_page_after_root(current: &str) -> UrlResult<Option<String>> {
    let url = parse(current)?;
    let next = match page_parameter(&url) {
        Some(page) => page.checked_add(1),
        None => Some(2),
    };
    Ok(next.map(|page| with_page(&url, page).to_string()))
}

/// Computes the page after a follow-up listing page
///
/// Returns `Ok(None)` if the URL carries no usable page parameter or the
/// page number cannot be incremented.
pub fn next_listing_page(current: &str) -> UrlResult<Option<String>> {
    let url = parse(current)?;
    Ok(page_parameter(&url)
        .and_then(|page| page.checked_add(1))
        .map(|page| with_page(&url, page).to_string()))
}

fn parse(raw: &str) -> UrlResult<Url> {
    Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))
}
