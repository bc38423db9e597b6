//! Crawl engine - admission, task execution and lifecycle
//!
//! This module contains the engine that coordinates every part of a run:
//! - The admission gate (depth limit + dedup) every URL passes through
//! - Submission of crawl tasks to the current worker pool
//! - Fetch, link extraction and recursive fan-out on workers
//! - One retry per failing URL
//! - Periodic checkpoints, pool resizing, draining and shutdown
//!
//! # Depth convention
//!
//! A task carries the depth at which its URL was admitted. The seed is
//! admitted at [`SEED_DEPTH`]; a page at depth `d` offers its links at
//! `d + 1`; a retry keeps `d`. No task ever carries a depth above
//! `max_depth`, and pages at `max_depth` are fetched but not expanded.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::LinkExtractor;
use crate::crawler::pool::{CrawlTask, InFlightTracker, TaskHandler, WorkerId, WorkerPool};
use crate::output::{CrawlStats, CrawlSummary, StatsSnapshot};
use crate::state::{RetryTracker, VisitedSet};
use crate::storage::{Checkpointer, StateStore};
use crate::{CrawlError, FetchError, PersistenceResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

/// Depth at which the seed URL is admitted
pub const SEED_DEPTH: u32 = 0;

/// Outcome of a [`CrawlEngine::crawl`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The URL was marked visited and a task was queued
    Submitted,

    /// The requested depth exceeds `max_depth`
    SkippedDepth,

    /// The URL was already visited (at any depth)
    SkippedVisited,

    /// The URL was marked visited but the pool no longer accepts work
    Rejected,
}

impl Admission {
    /// Returns true if the URL passed the admission gate
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Submitted | Self::Rejected)
    }
}

/// Concurrent, depth-bounded, deduplicating crawl engine
///
/// Cloning yields another handle to the same engine. Workers hold only a weak
/// reference, so dropping every handle tears the pool down; call
/// [`CrawlEngine::shutdown`] to finish queued work and persist the visited set.
pub struct CrawlEngine<F, E> {
    inner: Arc<EngineInner<F, E>>,
}

impl<F, E> Clone for CrawlEngine<F, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<F, E> {
    config: CrawlerConfig,
    fetcher: F,
    extractor: E,
    visited: Arc<VisitedSet>,
    retries: RetryTracker,
    stats: CrawlStats,
    checkpointer: Arc<Checkpointer>,
    pool: RwLock<Arc<WorkerPool>>,
    tracker: Arc<InFlightTracker>,
    next_task_id: AtomicU64,
    next_pool_id: AtomicU64,
    shut_down: AtomicBool,
    started_at: Instant,
}

impl<F: Fetcher, E: LinkExtractor> CrawlEngine<F, E> {
    /// Creates an engine and starts its worker pool
    ///
    /// Unless `fresh` is set, the visited set is restored from `store`. A
    /// store that fails to load is logged and treated as empty.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool size, depth limit, delays and checkpoint cadence
    /// * `fetcher` - Retrieves page bodies
    /// * `extractor` - Pulls absolute links out of page bodies
    /// * `store` - Persistence backend for the visited set
    /// * `fresh` - Ignore previously persisted state
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Engine with a running pool
    /// * `Err(CrawlError::InvalidPoolSize)` - `config.worker_count` is zero
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime, since the pool's workers
    /// are spawned immediately.
    pub fn new(
        config: CrawlerConfig,
        fetcher: F,
        extractor: E,
        store: Arc<dyn StateStore>,
        fresh: bool,
    ) -> crate::Result<Self> {
        if config.worker_count == 0 {
            return Err(CrawlError::InvalidPoolSize(0));
        }

        let checkpointer = Arc::new(Checkpointer::new(store));
        let visited = if fresh {
            tracing::info!("Starting fresh, ignoring persisted visited URLs");
            VisitedSet::new()
        } else {
            match checkpointer.load() {
                Ok(urls) if urls.is_empty() => {
                    tracing::info!("No saved visited URLs found. Starting fresh.");
                    VisitedSet::new()
                }
                Ok(urls) => {
                    tracing::info!("Loaded {} visited URLs from saved state", urls.len());
                    VisitedSet::from_urls(urls)
                }
                Err(e) => {
                    tracing::warn!("Error loading visited URLs, starting with none: {}", e);
                    VisitedSet::new()
                }
            }
        };

        let tracker = Arc::new(InFlightTracker::default());
        let worker_count = config.worker_count;

        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner<F, E>>| {
            let pool = WorkerPool::start(1, worker_count, Arc::clone(&tracker), weak.clone());
            EngineInner {
                config,
                fetcher,
                extractor,
                visited: Arc::new(visited),
                retries: RetryTracker::new(),
                stats: CrawlStats::new(),
                checkpointer,
                pool: RwLock::new(Arc::new(pool)),
                tracker,
                next_task_id: AtomicU64::new(1),
                next_pool_id: AtomicU64::new(2),
                shut_down: AtomicBool::new(false),
                started_at: Instant::now(),
            }
        });

        Ok(Self { inner })
    }

    /// Offers `url` for crawling at `depth`
    ///
    /// Performs the admission check and queue submission synchronously and
    /// returns without waiting for any network I/O.
    pub fn crawl(&self, url: &str, depth: u32) -> Admission {
        self.inner.crawl(url, depth)
    }

    /// Offers the start URL at [`SEED_DEPTH`]
    pub fn seed(&self, url: &str) -> Admission {
        self.inner.crawl(url, SEED_DEPTH)
    }

    /// Replaces the worker pool with one of `new_capacity` workers
    ///
    /// The current pool stops accepting work immediately and its workers are
    /// aborted: queued tasks and tasks in flight are abandoned, though their
    /// URLs stay in the visited set. Not meant to be called concurrently with
    /// itself or with [`CrawlEngine::shutdown`].
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The new pool is running
    /// * `Err(CrawlError::InvalidPoolSize)` - `new_capacity` is zero
    /// * `Err(CrawlError::ShutDown)` - The engine has already shut down
    pub fn resize(&self, new_capacity: usize) -> crate::Result<()> {
        if new_capacity == 0 {
            return Err(CrawlError::InvalidPoolSize(new_capacity));
        }

        let old = {
            let mut slot = self.inner.pool.write().unwrap_or_else(PoisonError::into_inner);
            if self.inner.shut_down.load(Ordering::SeqCst) {
                return Err(CrawlError::ShutDown);
            }

            let id = self.inner.next_pool_id.fetch_add(1, Ordering::SeqCst);
            let pool = WorkerPool::start(
                id,
                new_capacity,
                Arc::clone(&self.inner.tracker),
                Arc::downgrade(&self.inner),
            );
            let old = std::mem::replace(&mut *slot, Arc::new(pool));
            // Refuse stale submitters before they can see the new slot.
            old.close();
            old
        };

        old.abort();
        tracing::info!(
            "Thread pool size adjusted to: {} (was {})",
            new_capacity,
            old.capacity()
        );
        Ok(())
    }

    /// Waits until no task is queued or running
    ///
    /// Resolves immediately if the engine is already idle.
    pub async fn wait_idle(&self) {
        self.inner.tracker.wait_idle().await;
    }

    /// Stops the engine and persists the visited set
    ///
    /// New submissions are refused from this point on. Queued and in-flight
    /// tasks get up to `timeout` to finish; links they discover are marked
    /// visited but not crawled. If the timeout elapses the remaining workers
    /// are aborted. In every case the visited set is saved exactly once as
    /// the final step.
    pub async fn shutdown(&self, timeout: Duration) -> CrawlSummary {
        let pool = {
            let slot = self.inner.pool.write().unwrap_or_else(PoisonError::into_inner);
            self.inner.shut_down.store(true, Ordering::SeqCst);
            Arc::clone(&slot)
        };

        tracing::info!("Shutting down worker pool {}", pool.id());
        let drained = pool.drain(timeout).await;
        if !drained {
            tracing::warn!(
                "Worker pool did not terminate within {:?}; abandoning in-flight work",
                timeout
            );
        }

        let persisted = match self.inner.save_now().await {
            Ok(count) => {
                tracing::info!("Visited URLs saved ({} entries)", count);
                true
            }
            Err(e) => {
                tracing::warn!("Error saving visited URLs: {}", e);
                false
            }
        };

        CrawlSummary {
            stats: self.inner.stats.snapshot(),
            elapsed: self.inner.started_at.elapsed(),
            timed_out: !drained,
            visited_set_size: self.inner.visited.len(),
            persisted,
        }
    }

    /// Shared visited set
    pub fn visited(&self) -> &VisitedSet {
        &self.inner.visited
    }

    /// URLs that have failed at least once this run
    pub fn retry_tracker(&self) -> &RetryTracker {
        &self.inner.retries
    }

    /// Current counter values
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of workers in the current pool
    pub fn pool_capacity(&self) -> usize {
        self.inner.current_pool().capacity()
    }

    /// Whether the current pool accepts new tasks
    pub fn is_accepting(&self) -> bool {
        self.inner.current_pool().is_accepting()
    }

    /// Tasks queued or running across all pools
    pub fn outstanding(&self) -> usize {
        self.inner.tracker.outstanding()
    }
}

impl<F: Fetcher, E: LinkExtractor> EngineInner<F, E> {
    fn crawl(&self, url: &str, depth: u32) -> Admission {
        if depth > self.config.max_depth {
            tracing::debug!("Skipping URL: {} (depth: {})", url, depth);
            self.stats.record_skipped();
            return Admission::SkippedDepth;
        }

        // Check and mark are one step; only one caller per URL gets past here.
        if !self.visited.insert(url) {
            tracing::debug!("Skipping URL: {} (already visited)", url);
            self.stats.record_skipped();
            return Admission::SkippedVisited;
        }

        let total = self.stats.record_admitted();
        tracing::debug!("Total URLs visited so far: {}", total);

        let task = CrawlTask::new(self.next_task_id(), url, depth);
        match self.submit(task) {
            Ok(()) => {
                let count = self.stats.record_submitted();
                if count % self.config.checkpoint_interval.max(1) == 0 {
                    self.checkpoint_in_background();
                }
                Admission::Submitted
            }
            Err(task) => {
                tracing::debug!(task = task.id, "Pool closed, not crawling {}", task.url);
                self.stats.record_rejected();
                Admission::Rejected
            }
        }
    }

    /// Submits to the current pool, following concurrent resizes
    fn submit(&self, task: CrawlTask) -> Result<(), CrawlTask> {
        self.submit_via(self.current_pool(), task)
    }

    /// Submits starting from `pool`, moving to the current pool if `pool`
    /// was closed by a resize
    fn submit_via(&self, pool: Arc<WorkerPool>, task: CrawlTask) -> Result<(), CrawlTask> {
        let mut pool = pool;
        let mut task = task;
        loop {
            match pool.submit(task) {
                Ok(()) => return Ok(()),
                Err(rejected) => {
                    let current = self.current_pool();
                    if Arc::ptr_eq(&current, &pool) {
                        return Err(rejected);
                    }
                    pool = current;
                    task = rejected;
                }
            }
        }
    }

    fn current_pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&self.pool.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn handle_failure(&self, task: CrawlTask, error: FetchError) {
        self.stats.record_fetch_failure();
        tracing::warn!(task = task.id, "Failed to fetch or parse URL: {}", error);

        if !self.retries.mark_failed(&task.url) {
            self.stats.record_abandoned();
            tracing::warn!(task = task.id, "URL permanently failed: {}", task.url);
            return;
        }

        let retry = task.retry(self.next_task_id());
        match self.submit(retry) {
            Ok(()) => {
                self.stats.record_retry();
                tracing::info!(task = task.id, "Retrying URL: {}", task.url);
            }
            Err(dropped) => {
                tracing::info!(
                    task = dropped.id,
                    "Pool is shutting down. Skipping retry for URL: {}",
                    dropped.url
                );
            }
        }
    }

    /// Best-effort checkpoint that never blocks the submitting thread
    fn checkpoint_in_background(&self) {
        let checkpointer = Arc::clone(&self.checkpointer);
        let visited = Arc::clone(&self.visited);
        let job = move || log_checkpoint(checkpointer.save(&visited));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }

    async fn save_now(&self) -> PersistenceResult<usize> {
        let checkpointer = Arc::clone(&self.checkpointer);
        let visited = Arc::clone(&self.visited);
        match tokio::task::spawn_blocking(move || checkpointer.save(&visited)).await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e).into()),
        }
    }
}

fn log_checkpoint(result: PersistenceResult<usize>) {
    match result {
        Ok(count) => tracing::debug!("Checkpoint saved {} visited URLs", count),
        Err(e) => tracing::warn!("Checkpoint failed, will retry at next interval: {}", e),
    }
}

impl<F: Fetcher, E: LinkExtractor> TaskHandler for EngineInner<F, E> {
    async fn handle(&self, task: CrawlTask, worker: WorkerId) {
        tracing::info!(
            task = task.id,
            depth = task.depth,
            attempt = task.attempt,
            "{} crawling: {}",
            worker,
            task.url
        );

        match self.fetcher.fetch(&task.url).await {
            Ok(body) => {
                self.stats.record_fetched();
                if task.depth < self.config.max_depth {
                    let links = self.extractor.extract(&body, &task.url);
                    tracing::debug!(task = task.id, "Found {} links on {}", links.len(), task.url);
                    for link in &links {
                        self.crawl(link, task.depth + 1);
                    }
                } else {
                    tracing::debug!(task = task.id, "Depth limit reached, not expanding {}", task.url);
                }
            }
            Err(e) => self.handle_failure(task, e),
        }

        let delay = self.config.politeness_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
