//! Bounded worker pool executing crawl tasks
//!
//! A pool is a fixed number of tokio tasks pulling jobs from one shared
//! unbounded queue. Pools are never resized in place: the engine replaces the
//! whole pool and closes the old one.
//!
//! Every queued job carries an [`InFlight`] guard. The guard is dropped when
//! the job finishes, when a worker running it is aborted, or when a closed
//! pool discards its queue, so the outstanding count is exact in every case.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinSet;
use tracing::Instrument;

/// A unit of scheduled work: fetch `url`, admitted at `depth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Run-unique task identifier, used in log output
    pub id: u64,

    /// URL to fetch
    pub url: String,

    /// Depth at which the URL was admitted (the seed is depth 0)
    pub depth: u32,

    /// 1 for the first attempt, 2 for the single retry
    pub attempt: u8,
}

impl CrawlTask {
    pub fn new(id: u64, url: impl Into<String>, depth: u32) -> Self {
        Self {
            id,
            url: url.into(),
            depth,
            attempt: 1,
        }
    }

    /// The retry of this task: same URL, same depth, next attempt
    pub fn retry(&self, id: u64) -> Self {
        Self {
            id,
            url: self.url.clone(),
            depth: self.depth,
            attempt: self.attempt.saturating_add(1),
        }
    }
}

/// Identifies one worker of one pool generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId {
    pub pool: u64,
    pub index: usize,
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}-worker-{}", self.pool, self.index)
    }
}

/// Something that can execute crawl tasks on behalf of a pool
pub(crate) trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: CrawlTask, worker: WorkerId) -> impl Future<Output = ()> + Send;
}

/// Counts jobs that are queued or running across every pool of an engine
#[derive(Debug, Default)]
pub(crate) struct InFlightTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl InFlightTracker {
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once no job is queued or running
    pub(crate) async fn wait_idle(&self) {
        loop {
            // Registered before the check so a wake-up in between is not lost.
            let notified = self.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII marker for one outstanding job
#[derive(Debug)]
pub(crate) struct InFlight {
    tracker: Arc<InFlightTracker>,
}

impl InFlight {
    fn new(tracker: &Arc<InFlightTracker>) -> Self {
        tracker.outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            tracker: Arc::clone(tracker),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.tracker.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

struct Job {
    task: CrawlTask,
    in_flight: InFlight,
}

type SharedQueue = Arc<AsyncMutex<mpsc::UnboundedReceiver<Job>>>;

/// One generation of workers sharing a task queue
pub(crate) struct WorkerPool {
    id: u64,
    capacity: usize,
    tracker: Arc<InFlightTracker>,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    /// Spawns `capacity` workers that hand tasks to `handler`
    ///
    /// Workers hold only a weak reference to the handler and exit once it is
    /// gone. Must be called from within a tokio runtime.
    pub(crate) fn start<H: TaskHandler>(
        id: u64,
        capacity: usize,
        tracker: Arc<InFlightTracker>,
        handler: Weak<H>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: SharedQueue = Arc::new(AsyncMutex::new(receiver));

        let mut workers = JoinSet::new();
        for index in 0..capacity {
            let worker = WorkerId { pool: id, index };
            let span = tracing::info_span!("worker", pool = id, worker = index);
            workers.spawn(run_worker(worker, Arc::clone(&queue), handler.clone()).instrument(span));
        }

        tracing::debug!("Started worker pool {} with {} workers", id, capacity);

        Self {
            id,
            capacity,
            tracker,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Some(workers)),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Queues a task, handing it back if the pool no longer accepts work
    pub(crate) fn submit(&self, task: CrawlTask) -> Result<(), CrawlTask> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(task);
        };

        let job = Job {
            task,
            in_flight: InFlight::new(&self.tracker),
        };
        sender.send(job).map_err(|mpsc::error::SendError(job)| job.task)
    }

    /// Stops accepting new submissions
    ///
    /// Already queued jobs stay queued; workers exit once the queue is empty.
    pub(crate) fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Closes the pool and aborts its workers without waiting
    ///
    /// Queued jobs are discarded and running jobs are cancelled at their next
    /// suspension point.
    pub(crate) fn abort(&self) {
        self.close();
        if let Some(mut workers) = self.take_workers() {
            workers.abort_all();
        }
    }

    /// Closes the pool and waits up to `timeout` for the queue to drain
    ///
    /// Returns `true` if every worker finished in time. On timeout the
    /// remaining workers are aborted and `false` is returned.
    pub(crate) async fn drain(&self, timeout: Duration) -> bool {
        self.close();
        let Some(mut workers) = self.take_workers() else {
            return true;
        };

        match tokio::time::timeout(timeout, join_all(&mut workers)).await {
            Ok(()) => true,
            Err(_) => {
                workers.abort_all();
                false
            }
        }
    }

    fn take_workers(&self) -> Option<JoinSet<()>> {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Worker panicked: {}", e);
            }
        }
    }
}

async fn run_worker<H: TaskHandler>(worker: WorkerId, queue: SharedQueue, handler: Weak<H>) {
    tracing::trace!("Worker {} started", worker);

    loop {
        let job = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(Job { task, in_flight }) = job else {
            break;
        };
        let Some(handler) = handler.upgrade() else {
            break;
        };

        handler.handle(task, worker).await;
        drop(in_flight);
    }

    tracing::trace!("Worker {} stopped", worker);
}
