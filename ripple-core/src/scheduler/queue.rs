//! Batching Job Queue
//!
//! Component updates are not run when their state changes. Instead their
//! update job is queued, and the queue is flushed once, later.
//!
//! # Algorithm
//!
//! 1. `queue_job` adds the job to an ordered set keyed by job ID, so a job
//!    queued twice before a flush runs once.
//!
//! 2. The first enqueue while no flush is booked books exactly one deferred
//!    flush through the [`Defer`] primitive. Later enqueues collapse into it.
//!
//! 3. The flush clears the booking flag, then pops jobs front-to-back until
//!    the set is empty. Jobs queued while flushing join the same loop, so a
//!    render that causes another render settles within one flush.
//!
//! 4. A job that runs more than `recursion_limit` times within one flush is
//!    dropped for the rest of that flush.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::defer::{Defer, Deferred};
use crate::config::SchedulerConfig;
use crate::reactive::SubscriberId;

/// Identity of a job. Queuing a job whose ID is already pending is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        // High bit keeps generated IDs apart from subscriber-derived ones.
        Self(COUNTER.fetch_add(1, Ordering::Relaxed) | 1 << 63)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SubscriberId> for JobId {
    fn from(id: SubscriberId) -> Self {
        Self(id.raw())
    }
}

/// A unit of deferred work.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Job {
    /// A job with a fresh identity.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_id(JobId::new(), run)
    }

    pub fn with_id<F>(id: JobId, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            run: Arc::new(run),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn run(&self) {
        (self.run)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

/// Deduplicating FIFO queue of pending jobs with single-flight flushing.
///
/// Cloning a queue yields another handle to the same queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    defer: Arc<dyn Defer>,
    config: SchedulerConfig,
    jobs: Mutex<IndexMap<JobId, Job>>,
    flush_pending: AtomicBool,
    /// Callbacks waiting for the booked flush to finish.
    after_flush: Mutex<Vec<Deferred>>,
}

impl JobQueue {
    pub fn new(defer: Arc<dyn Defer>) -> Self {
        Self::with_config(defer, SchedulerConfig::default())
    }

    pub fn with_config(defer: Arc<dyn Defer>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                defer,
                config,
                jobs: Mutex::new(IndexMap::new()),
                flush_pending: AtomicBool::new(false),
                after_flush: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Add a job unless it is already pending, and make sure a flush is
    /// booked.
    pub fn queue_job(&self, job: Job) {
        self.inner.jobs.lock().entry(job.id).or_insert(job);
        self.queue_flush();
    }

    /// Book a flush unless one is already booked.
    pub fn queue_flush(&self) {
        if self.inner.flush_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let queue = self.clone();
        self.inner.defer.defer(Box::new(move || queue.flush_jobs()));
    }

    /// Run every pending job, front to back, until none remain.
    pub fn flush_jobs(&self) {
        self.inner.flush_pending.store(false, Ordering::Release);

        let limit = self.inner.config.recursion_limit;
        let mut runs: HashMap<JobId, usize> = HashMap::new();
        let mut ran = 0usize;

        debug!(pending = self.len(), "flush start");
        loop {
            let next = self.inner.jobs.lock().shift_remove_index(0);
            let Some((id, job)) = next else {
                break;
            };

            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                if *count == limit + 1 {
                    error!(
                        job = id.raw(),
                        limit, "maximum recursive updates exceeded; dropping job for this flush"
                    );
                }
                continue;
            }

            job.run();
            ran += 1;
        }
        debug!(ran, "flush finished");

        let waiting = std::mem::take(&mut *self.inner.after_flush.lock());
        for callback in waiting {
            callback();
        }
    }

    /// Run `f` after the booked flush, or on the next deferral if none is
    /// booked.
    pub fn next_tick<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut waiting = self.inner.after_flush.lock();
        if self.inner.flush_pending.load(Ordering::Acquire) {
            waiting.push(Box::new(f));
        } else {
            drop(waiting);
            self.inner.defer.defer(Box::new(f));
        }
    }

    /// Resolve once the booked flush (if any) has run.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        self.next_tick(move || {
            let _ = tx.send(());
        });
        // A dropped sender means the callback was discarded; nothing to wait on.
        let _ = rx.await;
    }

    pub fn is_flush_pending(&self) -> bool {
        self.inner.flush_pending.load(Ordering::Acquire)
    }

    /// Number of jobs waiting to run.
    pub fn len(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.lock().is_empty()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.len())
            .field("flush_pending", &self.is_flush_pending())
            .finish()
    }
}

// ---- Tests ----
