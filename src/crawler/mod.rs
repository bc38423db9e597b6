//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The crawl engine and its admission gate
//! - The bounded worker pool that executes crawl tasks
//! - HTTP fetching
//! - HTML parsing and link extraction

mod engine;
mod fetcher;
mod parser;
mod pool;

pub use engine::{Admission, CrawlEngine, SEED_DEPTH};
pub use fetcher::{build_http_client, Fetcher, HttpFetcher};
pub use parser::{HtmlLinkExtractor, LinkExtractor};
pub use pool::{CrawlTask, WorkerId};

use crate::config::{validate, Config};
use crate::storage::open_state_store;
use std::sync::Arc;

/// Engine that crawls over HTTP and persists to the configured state file
pub type HttpCrawlEngine = CrawlEngine<HttpFetcher, HtmlLinkExtractor>;

/// Builds a production engine from a complete configuration
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration
/// 2. Build the HTTP client
/// 3. Open the SQLite state file and restore visited URLs (unless `fresh`)
/// 4. Start the worker pool
///
/// # Returns
///
/// * `Ok(HttpCrawlEngine)` - Engine ready to be seeded
/// * `Err(CrawlError::Config)` - The configuration is invalid
/// * `Err(CrawlError::HttpClient)` - The HTTP client could not be built
///
/// Must be called from within a tokio runtime.
pub fn http_engine(config: &Config, fresh: bool) -> crate::Result<HttpCrawlEngine> {
    validate(config)?;
    let fetcher = HttpFetcher::new(&config.http)?;
    let store = Arc::new(open_state_store(&config.state.path));

    CrawlEngine::new(
        config.crawler.clone(),
        fetcher,
        HtmlLinkExtractor::new(),
        store,
        fresh,
    )
}
