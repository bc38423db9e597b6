//! State module for tracking crawl progress
//!
//! This module provides the two pieces of shared mutable state the workers
//! touch during a run.
//!
//! # Components
//!
//! - `VisitedSet`: every URL admitted for crawling; source of the dedup invariant
//! - `RetryTracker`: URLs whose fetch has already failed once

mod retry;
mod visited;

// Re-export main types
pub use retry::RetryTracker;
pub use visited::VisitedSet;
