//! "Run later" primitives.
//!
//! The job queue never runs a flush inline: it hands the flush to a
//! [`Defer`] implementation, which decides when "later" is. Two are provided:
//!
//! - [`ManualTicker`] collects deferred tasks until [`ManualTicker::tick`] is
//!   called. Deterministic, which makes it the choice for tests and for hosts
//!   that own their event loop.
//! - [`TokioDefer`] spawns each task onto a tokio runtime.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::trace;

use crate::error::Result;

/// A task handed to a [`Defer`] implementation.
pub type Deferred = Box<dyn FnOnce() + Send>;

/// Capability to run a task after the current synchronous work completes.
pub trait Defer: Send + Sync {
    fn defer(&self, task: Deferred);
}

/// Deferral driven by explicit ticks.
#[derive(Default)]
pub struct ManualTicker {
    pending: Mutex<VecDeque<Deferred>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run deferred tasks in FIFO order until none remain, including tasks
    /// deferred by the tasks being run. Returns how many ran.
    pub fn tick(&self) -> usize {
        let mut ran = 0;
        loop {
            // Popped under the lock, run outside it.
            let task = self.pending.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        trace!(ran, "tick");
        ran
    }

    /// Number of tasks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Defer for ManualTicker {
    fn defer(&self, task: Deferred) {
        self.pending.lock().push_back(task);
    }
}

impl fmt::Debug for ManualTicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTicker")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Deferral onto a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioDefer {
    handle: Handle,
}

impl TokioDefer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Defer for TokioDefer {
    fn defer(&self, task: Deferred) {
        // Detached: completion is observed through the job queue.
        drop(self.handle.spawn(async move { task() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticker_runs_nothing_until_ticked() {
        let ticker = ManualTicker::new();
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        ticker.defer(Box::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ticker.pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(ticker.tick(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(ticker.pending(), 0);
    }

    #[test]
    fn tick_drains_tasks_deferred_while_ticking() {
        let ticker = Arc::new(ManualTicker::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        {
            let ticker_inner = ticker.clone();
            let order = order.clone();
            ticker.defer(Box::new(move || {
                order.lock().push(1);
                let order = order.clone();
                ticker_inner.defer(Box::new(move || order.lock().push(3)));
            }));
        }
        {
            let order = order.clone();
            ticker.defer(Box::new(move || order.lock().push(2)));
        }

        assert_eq!(ticker.tick(), 3);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn tokio_defer_requires_a_runtime() {
        assert!(TokioDefer::current().is_err());
    }

    #[tokio::test]
    async fn tokio_defer_spawns_tasks() {
        let defer = TokioDefer::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        defer.defer(Box::new(move || {
            let _ = tx.send(7);
        }));

        assert_eq!(rx.await.unwrap(), 7);
    }
}
