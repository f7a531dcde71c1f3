//! Ref Implementation
//!
//! A Ref is a single-value reactive container. It holds a value and the set
//! of computations that read it.
//!
//! # How Refs Work
//!
//! 1. Reading a ref within a running subscriber registers that subscriber in
//!    the ref's dependency set.
//!
//! 2. Writing a ref notifies every subscriber, but only when the new value
//!    differs from the stored raw value.
//!
//! 3. A composite value is stored twice: the raw target, used for change
//!    detection, and a mutable wrapper around it, handed out by reads.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::dep::Dep;
use super::value::Value;
use super::wrapper::reactive;

/// A reactive cell holding one [`Value`].
///
/// Cloning a ref yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
#[derive(Clone)]
pub struct Ref {
    inner: Arc<RefInner>,
}

struct RefInner {
    state: RwLock<RefState>,
    dep: Dep,
}

struct RefState {
    raw: Value,
    value: Value,
}

impl RefState {
    fn new(raw: Value) -> Self {
        let raw = raw.into_raw();
        let value = match &raw {
            Value::Object(target) => Value::Proxy(reactive(target.clone())),
            other => other.clone(),
        };
        Self { raw, value }
    }
}

impl Ref {
    /// Create a ref with the given initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(RefInner {
                state: RwLock::new(RefState::new(value.into())),
                dep: Dep::new(),
            }),
        }
    }

    /// Get the current value, registering the running subscriber.
    pub fn get(&self) -> Value {
        self.inner.dep.track();
        self.get_untracked()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.inner.state.read().value.clone()
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let next = RefState::new(value.into());
        {
            let mut state = self.inner.state.write();
            if state.raw.same(&next.raw) {
                return;
            }
            *state = next;
        }

        self.inner.dep.trigger();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// The ref's dependency set.
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &self.inner.state.read().raw)
            .field("subscribers", &self.inner.dep.len())
            .finish()
    }
}

/// Whether a value is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The value inside a ref, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}
