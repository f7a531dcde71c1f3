//! Dependency sets.
//!
//! A [`Dep`] is the set of subscribers interested in one observation point:
//! a property of a target, the value of a ref, or the result of a computed
//! cell. Membership is keyed by subscriber ID, so registering twice is a
//! no-op.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Dependent, SubscriberId};

/// The subscribers interested in one observation point.
///
/// Cloning a `Dep` yields another handle to the same set.
#[derive(Clone, Default)]
pub struct Dep {
    subscribers: Arc<Mutex<IndexMap<SubscriberId, Arc<dyn Dependent>>>>,
}

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the running subscriber, if reads are being tracked.
    pub fn track(&self) {
        if let Some(subscriber) = ReactiveContext::tracking_subscriber() {
            self.add(subscriber);
        }
    }

    pub(crate) fn add(&self, subscriber: Arc<dyn Dependent>) {
        let id = subscriber.subscriber_id();
        let inserted = {
            let mut subscribers = self.subscribers.lock();
            if subscribers.contains_key(&id) {
                false
            } else {
                subscribers.insert(id, Arc::clone(&subscriber));
                true
            }
        };

        if inserted {
            trace!(subscriber = id.raw(), "dependency registered");
            subscriber.link(self);
        }
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        let removed = self.subscribers.lock().shift_remove(&id);
        // Dropped outside the lock: it may hold the last handle to closures
        // that own other reactive state.
        drop(removed);
    }

    /// Notify every subscriber in the set.
    ///
    /// Subscribers with a scheduler get the scheduler called; the rest are
    /// re-run synchronously. The set is snapshotted first, and the subscriber
    /// currently running is skipped so it cannot re-enter itself.
    pub fn trigger(&self) {
        let snapshot: Vec<Arc<dyn Dependent>> =
            self.subscribers.lock().values().cloned().collect();
        if snapshot.is_empty() {
            return;
        }

        let running = ReactiveContext::current_subscriber();
        trace!(subscribers = snapshot.len(), "trigger");

        for subscriber in snapshot {
            if Some(subscriber.subscriber_id()) == running {
                continue;
            }
            subscriber.notify();
        }
    }

    /// Whether the given subscriber is in the set.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep").field("len", &self.len()).finish()
    }
}
