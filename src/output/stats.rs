//! Run-scoped crawl counters and the end-of-run summary
//!
//! Counters are updated concurrently by the submission path and by workers,
//! so they are plain atomics. [`CrawlStats::snapshot`] copies them into a
//! value type for reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by the engine and its workers
#[derive(Debug, Default)]
pub struct CrawlStats {
    urls_visited: AtomicU64,
    crawl_count: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    pages_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    retries: AtomicU64,
    abandoned: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a URL passing the admission gate; returns the new total
    pub fn record_admitted(&self) -> u64 {
        self.urls_visited.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records a successful task submission; returns the new crawl count
    pub fn record_submitted(&self) -> u64 {
        self.crawl_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            urls_visited: self.urls_visited.load(Ordering::SeqCst),
            crawl_count: self.crawl_count.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// URLs that passed the admission gate
    pub urls_visited: u64,

    /// Tasks successfully submitted to a pool (drives checkpoints)
    pub crawl_count: u64,

    /// `crawl` calls turned away by the depth or dedup gate
    pub skipped: u64,

    /// Admitted URLs whose submission found the pool closed
    pub rejected: u64,

    /// Pages fetched successfully
    pub pages_fetched: u64,

    /// Failed fetch attempts, first tries and retries alike
    pub fetch_failures: u64,

    /// Retries submitted after a first failure
    pub retries: u64,

    /// URLs given up on after their second failure
    pub abandoned: u64,
}

/// Final report returned by shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub stats: StatsSnapshot,

    /// Time since the engine was started
    pub elapsed: Duration,

    /// Whether the shutdown wait ran out before all tasks finished
    pub timed_out: bool,

    /// Size of the visited set at shutdown
    pub visited_set_size: usize,

    /// Whether the final save succeeded
    pub persisted: bool,
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    let stats = &summary.stats;

    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Total URLs visited: {}", stats.urls_visited);
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Visited set size: {}", summary.visited_set_size);
    println!("  Total time taken: {} ms", summary.elapsed.as_millis());
    println!();

    println!("Scheduling:");
    println!("  Tasks submitted: {}", stats.crawl_count);
    println!("  Skipped (depth or already visited): {}", stats.skipped);
    println!("  Rejected (pool closed): {}", stats.rejected);
    println!();

    if stats.fetch_failures > 0 {
        println!("Failures:");
        println!("  Failed attempts: {}", stats.fetch_failures);
        println!("  Retries: {}", stats.retries);
        println!("  Abandoned URLs: {}", stats.abandoned);
        println!();
    }

    if summary.timed_out {
        println!("Shutdown timed out; some in-flight work was abandoned.");
    }
    if !summary.persisted {
        println!("Warning: final visited-set save failed.");
    }
}
