//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a reactive value is read,
//! the current computation is registered in that value's dependency set.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! Running a subscriber pushes an entry; the guard pops it when dropped.
//! Each entry carries its own tracking flag, so a nested run restores both the
//! outer subscriber and its tracking state when it returns, and
//! [`untracked`] can suspend tracking for a region of code.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{Dependent, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// The running computation, or `None` for an untracked region.
    subscriber: Option<Arc<dyn Dependent>>,
    /// Whether reads inside this entry register dependencies.
    tracking: bool,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given subscriber.
    pub(crate) fn enter(subscriber: Arc<dyn Dependent>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some(subscriber),
                tracking: true,
            });
        });

        Self { subscriber_id }
    }

    /// Enter a region where reads do not register dependencies.
    pub fn pause() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: None,
                tracking: false,
            });
        });

        Self { subscriber_id: None }
    }

    /// Check whether a read right now would register a dependency.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.tracking && entry.subscriber.is_some())
        })
    }

    /// Get the ID of the running subscriber, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref().map(|s| s.subscriber_id()))
        })
    }

    /// The subscriber that reads should be recorded against.
    ///
    /// Returns `None` when tracking is disabled or nothing is running.
    pub(crate) fn tracking_subscriber() -> Option<Arc<dyn Dependent>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| entry.tracking)
                .and_then(|entry| entry.subscriber.clone())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Mismatched guards mean a context outlived its scope.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber.as_ref().map(|s| s.subscriber_id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }

        // The entry may own the last handle to a subscriber; release it
        // outside the stack borrow.
        drop(popped);
    }
}

/// Run `f` without recording any dependencies.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::pause();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::dep::Dep;

    struct Watcher(SubscriberId);

    impl Dependent for Watcher {
        fn subscriber_id(&self) -> SubscriberId {
            self.0
        }

        fn notify(self: Arc<Self>) {}

        fn link(&self, _dep: &Dep) {}
    }

    fn watcher() -> Arc<dyn Dependent> {
        Arc::new(Watcher(SubscriberId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = watcher();
        let id = sub.subscriber_id();

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = watcher();
        let inner = watcher();
        let outer_id = outer.subscriber_id();
        let inner_id = inner.subscriber_id();

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));
            }

            // The outer subscriber tracks again once the inner run is done
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
            assert!(ReactiveContext::is_tracking());
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_suspends_tracking() {
        let _ctx = ReactiveContext::enter(watcher());
        assert!(ReactiveContext::is_tracking());

        let inside = untracked(ReactiveContext::is_tracking);
        assert!(!inside);
        assert!(ReactiveContext::tracking_subscriber().is_some());
    }
}
