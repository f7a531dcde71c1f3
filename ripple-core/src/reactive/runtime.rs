//! Reactive Runtime
//!
//! The runtime owns the process-wide dependency map: for every observed
//! (target, property) pair, the [`Dep`] holding the subscribers that read it.
//!
//! # How It Works
//!
//! 1. A wrapper read calls [`Runtime::track`], which registers the running
//!    subscriber in the dependency set for that pair.
//!
//! 2. A wrapper write calls [`Runtime::trigger`], which notifies every
//!    subscriber in that set.
//!
//! 3. When the last handle to a target is dropped, its dependency sets are
//!    forgotten, so the map never outlives the data it describes.
//!
//! # Thread Safety
//!
//! The map is a `DashMap` keyed by target ID. Dependency sets are cloned out
//! of the map before they are touched, so no shard lock is held while
//! subscribers run.

use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::SubscriberId;
use super::value::{Key, Target, TargetId};

type TargetDeps = IndexMap<Key, Dep>;

static TARGET_MAP: OnceLock<DashMap<TargetId, TargetDeps>> = OnceLock::new();

fn target_map() -> &'static DashMap<TargetId, TargetDeps> {
    TARGET_MAP.get_or_init(DashMap::new)
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register the running subscriber against `(target, key)`.
    ///
    /// No-op when nothing is running or tracking is disabled.
    pub fn track(target: &Target, key: &str) {
        if !ReactiveContext::is_tracking() {
            return;
        }

        let dep = target_map()
            .entry(target.id())
            .or_default()
            .entry(Key::from(key))
            .or_default()
            .clone();

        dep.track();
    }

    /// Notify every subscriber that read `(target, key)`.
    pub fn trigger(target: &Target, key: &str) {
        let dep = target_map()
            .get(&target.id())
            .and_then(|deps| deps.get(key).cloned());

        if let Some(dep) = dep {
            dep.trigger();
        }
    }

    /// Number of subscribers registered against `(target, key)`.
    pub fn subscriber_count(target: &Target, key: &str) -> usize {
        target_map()
            .get(&target.id())
            .and_then(|deps| deps.get(key).map(Dep::len))
            .unwrap_or(0)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }

    /// Drop every dependency set of a target that no longer exists.
    pub(crate) fn forget(target: TargetId) {
        if let Some(map) = TARGET_MAP.get() {
            map.remove(&target);
        }
    }
}
