//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. The getter runs inside a subscriber whose scheduler does not re-run
//!    it; the scheduler only marks the cache dirty. The cache starts dirty.
//!
//! 2. Reading the value while dirty runs the getter, caches the result and
//!    marks the cache clean. Reading while clean returns the cache.
//!
//! 3. The clean to dirty transition triggers the computed's own dependency
//!    set, so effects that read the computed re-run.
//!
//! Computeds that are never read stay dirty and never run their getter.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::dep::Dep;
use super::effect::EffectOptions;
use super::subscriber::Subscriber;
use super::value::Value;

/// Cache state of a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last run (or there was no run yet).
    Dirty,
}

/// A lazily memoized derived value.
pub struct Computed<T = Value>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T: 'static> {
    runner: Subscriber<T>,
    dirty: Arc<AtomicBool>,
    cached: Mutex<Option<T>>,
    dep: Dep,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed. The getter does not run until the first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let dirty = Arc::new(AtomicBool::new(true));
        let dep = Dep::new();

        let scheduler = {
            let dirty = dirty.clone();
            let dep = dep.clone();
            move || {
                if !dirty.swap(true, Ordering::AcqRel) {
                    dep.trigger();
                }
            }
        };

        Self {
            inner: Arc::new(ComputedInner {
                runner: Subscriber::new(getter, EffectOptions::new().scheduler(scheduler)),
                dirty,
                cached: Mutex::new(None),
                dep,
            }),
        }
    }

    /// Get the value, recomputing only if dirty.
    pub fn get(&self) -> T {
        self.inner.dep.track();

        if !self.inner.dirty.swap(false, Ordering::AcqRel) {
            if let Some(value) = self.inner.cached.lock().clone() {
                return value;
            }
        }

        let value = self.inner.runner.run();
        *self.inner.cached.lock() = Some(value.clone());
        value
    }

    pub fn state(&self) -> ComputedState {
        if self.is_dirty() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Detach from every source. The cached value stays readable.
    pub fn stop(&self) {
        self.inner.runner.stop();
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("cached", &*self.inner.cached.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::ref_cell::Ref;
    use std::sync::atomic::AtomicI32;

    fn doubled(source: &Ref, calls: &Arc<AtomicI32>) -> Computed<f64> {
        let source = source.clone();
        let calls = calls.clone();
        Computed::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            source.get().as_number().unwrap_or_default() * 2.0
        })
    }

    #[test]
    fn computed_is_lazy() {
        let source = Ref::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let c = doubled(&source, &calls);

        assert_eq!(c.state(), ComputedState::Dirty);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(c.get(), 2.0);
        assert_eq!(c.state(), ComputedState::Clean);
    }

    #[test]
    fn getter_runs_once_per_invalidation() {
        let source = Ref::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let c = doubled(&source, &calls);

        for _ in 0..5 {
            assert_eq!(c.get(), 2.0);
        }
        source.set(2);
        assert!(c.is_dirty());
        for _ in 0..5 {
            assert_eq!(c.get(), 4.0);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidation_does_not_recompute_eagerly() {
        let source = Ref::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let c = doubled(&source, &calls);

        c.get();
        source.set(2);
        source.set(3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(c.get(), 6.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effects_rerun_when_computed_changes() {
        let source = Ref::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let c = doubled(&source, &calls);
        let seen = Arc::new(AtomicI32::new(0));

        let _runner = effect({
            let c = c.clone();
            let seen = seen.clone();
            move || {
                seen.store(c.get() as i32, Ordering::SeqCst);
            }
        });
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        source.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn stopped_computed_keeps_its_cache() {
        let source = Ref::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let c = doubled(&source, &calls);

        c.get();
        c.stop();
        source.set(9);

        assert!(!c.is_dirty());
        assert_eq!(c.get(), 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
