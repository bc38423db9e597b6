//! Output module for crawl counters and reports
//!
//! This module handles:
//! - Recording run-scoped crawl counters
//! - Producing the end-of-run summary returned by shutdown
//! - Printing that summary for operators

pub mod stats;

pub use stats::{print_summary, CrawlStats, CrawlSummary, StatsSnapshot};
