//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes effects, computed cells, and component render functions.
//!
//! # Lifecycle
//!
//! A subscriber starts **active**. Running it binds it as the current
//! computation so every tracked read records it, then returns the body's
//! result. [`Subscriber::stop`] moves it to **stopped**: it is removed from
//! every dependency set it joined and its on-stop callback fires. Stopping is
//! idempotent. A stopped subscriber can still be run, but its reads are no
//! longer recorded.
//!
//! Nothing reclaims an active subscriber: dependency sets hold it strongly
//! until it is stopped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::effect::{EffectOptions, OnStop, Scheduler};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency sets are keyed
/// by it, which keeps membership unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The type-erased face of a subscriber, as seen by dependency sets and the
/// context stack.
pub(crate) trait Dependent: Send + Sync {
    /// The subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// A dependency changed: call the scheduler, or re-run synchronously.
    fn notify(self: Arc<Self>);

    /// Record that this subscriber joined `dep`.
    fn link(&self, dep: &Dep);
}

/// A reactive computation.
///
/// Cloning a subscriber yields another handle to the same computation.
pub struct Subscriber<T = ()> {
    inner: Arc<SubscriberInner<T>>,
}

struct SubscriberInner<T> {
    id: SubscriberId,
    body: Box<dyn Fn() -> T + Send + Sync>,
    scheduler: Option<Scheduler>,
    on_stop: Mutex<Option<OnStop>>,
    state: Mutex<SubscriberState>,
}

struct SubscriberState {
    active: bool,
    /// Back-references to every dependency set this subscriber belongs to.
    deps: SmallVec<[Dep; 4]>,
}

impl<T: 'static> Subscriber<T> {
    /// Create a subscriber without running it.
    pub fn new<F>(body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let EffectOptions { scheduler, on_stop } = options;
        Self {
            inner: Arc::new(SubscriberInner {
                id: SubscriberId::new(),
                body: Box::new(body),
                scheduler,
                on_stop: Mutex::new(on_stop),
                state: Mutex::new(SubscriberState {
                    active: true,
                    deps: SmallVec::new(),
                }),
            }),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the body, recording its reads while active.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Stop the subscriber.
    ///
    /// Removes it from every dependency set and fires the on-stop callback.
    /// Calling this again does nothing.
    pub fn stop(&self) {
        let deps = {
            let mut state = self.inner.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            std::mem::take(&mut state.deps)
        };

        for dep in &deps {
            dep.remove(self.inner.id);
        }

        let on_stop = self.inner.on_stop.lock().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
    }

    /// Whether the subscriber has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Number of dependency sets this subscriber belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.state.lock().deps.len()
    }
}

impl<T: 'static> SubscriberInner<T> {
    fn run(self: &Arc<Self>) -> T {
        if !self.state.lock().active {
            return (self.body)();
        }

        let current: Arc<dyn Dependent> = self.clone();
        let _ctx = ReactiveContext::enter(current);
        (self.body)()
    }
}

impl<T: 'static> Dependent for SubscriberInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(self: Arc<Self>) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn link(&self, dep: &Dep) {
        let mut state = self.state.lock();
        if state.active {
            state.deps.push(dep.clone());
        }
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("active", &state.active)
            .field("dependency_count", &state.deps.len())
            .field("has_scheduler", &self.inner.scheduler.is_some())
            .finish()
    }
}
