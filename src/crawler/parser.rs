//! HTML parser for extracting links
//!
//! This module defines the [`LinkExtractor`] seam and an implementation on
//! top of `scraper` that pulls outbound links from `<a href>` tags.

use scraper::{Html, Selector};
use url::Url;

/// Extracts absolute outbound links from a fetched page
///
/// Implementations resolve relative links against `page_url`, return an empty
/// vector for pages without links, and never fail: malformed markup yields a
/// best-effort partial result.
pub trait LinkExtractor: Send + Sync + 'static {
    fn extract(&self, body: &str, page_url: &str) -> Vec<String>;
}

/// [`LinkExtractor`] for HTML documents
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links (same page anchors)
/// - Anything that does not resolve to an http(s) URL
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, body: &str, page_url: &str) -> Vec<String> {
        let Ok(base_url) = Url::parse(page_url) else {
            tracing::debug!("Cannot resolve links against invalid page URL {}", page_url);
            return Vec::new();
        };

        let document = Html::parse_document(body);
        extract_links(&document, &base_url)
    }
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
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

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
