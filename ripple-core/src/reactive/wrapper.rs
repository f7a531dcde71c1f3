//! Reactive wrappers.
//!
//! A [`Reactive`] is a view of a [`Target`] that hooks the runtime into every
//! read and write. Three modes exist:
//!
//! | mode | tracks reads | nested composites | writes |
//! |---|---|---|---|
//! | `Mutable` | yes | wrapped mutable | applied, trigger on change |
//! | `Readonly` | no | wrapped read-only | rejected with a warning |
//! | `ShallowReadonly` | no | returned raw | rejected with a warning |
//!
//! Refs stored in a target are unwrapped on read (except through a shallow
//! wrapper) and written through when a plain value is assigned over them.
//! Wrapping is not memoized: wrapping the same target twice yields two
//! wrappers that behave identically and compare equal under
//! [`Value::same`], but are distinct handles.

use std::fmt;

use tracing::warn;

use super::runtime::Runtime;
use super::value::{Key, Target, Value};

/// Pseudo-key tracked by `keys()` and triggered when the key set changes.
pub const ITERATE_KEY: &str = "\u{0}iterate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveMode {
    Mutable,
    Readonly,
    ShallowReadonly,
}

/// A reactive view of a target.
#[derive(Clone)]
pub struct Reactive {
    target: Target,
    mode: ReactiveMode,
}

/// Wrap a target so reads are tracked and writes trigger.
pub fn reactive(target: Target) -> Reactive {
    Reactive::new(target, ReactiveMode::Mutable)
}

/// Wrap a target so writes are rejected, at every depth.
pub fn readonly(target: Target) -> Reactive {
    Reactive::new(target, ReactiveMode::Readonly)
}

/// Wrap a target so top-level writes are rejected; nested values are raw.
pub fn shallow_readonly(target: Target) -> Reactive {
    Reactive::new(target, ReactiveMode::ShallowReadonly)
}

impl Reactive {
    pub fn new(target: Target, mode: ReactiveMode) -> Self {
        Self { target, mode }
    }

    pub fn mode(&self) -> ReactiveMode {
        self.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.mode != ReactiveMode::Mutable
    }

    /// The wrapped target.
    pub fn to_raw(&self) -> Target {
        self.target.clone()
    }

    /// Same target seen through the same mode.
    pub fn same(&self, other: &Reactive) -> bool {
        self.mode == other.mode && self.target.ptr_eq(&other.target)
    }

    /// Read a property. Missing properties read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        let raw = self.target.get_raw(key).unwrap_or_default();

        if self.mode == ReactiveMode::Mutable {
            Runtime::track(&self.target, key);
        }

        match self.mode {
            ReactiveMode::ShallowReadonly => raw,
            ReactiveMode::Mutable => match raw {
                Value::Ref(r) => r.get(),
                other => self.wrap_nested(other),
            },
            ReactiveMode::Readonly => match raw {
                Value::Ref(r) => self.wrap_nested(r.get_untracked()),
                other => self.wrap_nested(other),
            },
        }
    }

    fn wrap_nested(&self, value: Value) -> Value {
        match value {
            Value::Object(target) => Value::Proxy(Reactive::new(target, self.mode)),
            Value::Proxy(proxy) if proxy.mode != self.mode => {
                Value::Proxy(Reactive::new(proxy.target, self.mode))
            }
            other => other,
        }
    }

    /// Write a property.
    ///
    /// Returns `false` when the wrapper is read-only. Subscribers are
    /// triggered only when the stored value actually changes.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        if self.is_readonly() {
            warn!(
                key,
                target = self.target.id().raw(),
                "set operation on key failed: target is readonly"
            );
            return false;
        }

        let value = value.into().into_raw();
        let old = self.target.get_raw(key);

        if let Some(Value::Ref(r)) = &old {
            if !matches!(value, Value::Ref(_)) {
                r.set(value);
                return true;
            }
        }

        let changed = old.as_ref().map_or(true, |old| !old.same(&value));
        self.target.insert_raw(key, value);

        if changed {
            Runtime::trigger(&self.target, key);
            if old.is_none() {
                Runtime::trigger(&self.target, ITERATE_KEY);
            }
        }
        true
    }

    /// Remove a property. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        if self.is_readonly() {
            warn!(
                key,
                target = self.target.id().raw(),
                "delete operation on key failed: target is readonly"
            );
            return false;
        }

        if self.target.remove_raw(key).is_none() {
            return false;
        }
        Runtime::trigger(&self.target, key);
        Runtime::trigger(&self.target, ITERATE_KEY);
        true
    }

    pub fn has(&self, key: &str) -> bool {
        if self.mode == ReactiveMode::Mutable {
            Runtime::track(&self.target, key);
        }
        self.target.contains_key(key)
    }

    pub fn keys(&self) -> Vec<Key> {
        if self.mode == ReactiveMode::Mutable {
            Runtime::track(&self.target, ITERATE_KEY);
        }
        self.target.keys_raw()
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.target.id().raw())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::ref_cell::Ref;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn counting_effect(
        state: &Reactive,
        read: impl Fn(&Reactive) + Send + Sync + 'static,
    ) -> (crate::reactive::Subscriber, Arc<AtomicI32>) {
        let runs = Arc::new(AtomicI32::new(0));
        let runner = effect({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                read(&state);
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        (runner, runs)
    }

    #[test]
    fn reads_track_and_writes_trigger() {
        let state = reactive(Target::new().with("count", 0));
        let (_runner, runs) = counting_effect(&state, |s| {
            s.get("count");
        });

        state.set("count", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(state.get("count"), Value::from(1));
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let state = reactive(Target::new().with("count", 0));
        let (_runner, runs) = counting_effect(&state, |s| {
            s.get("count");
        });

        assert!(state.set("count", 0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_objects_are_wrapped_and_tracked() {
        let inner = Target::new().with("n", 1);
        let state = reactive(Target::new().with("inner", inner.clone()));

        let nested = state.get("inner");
        assert_eq!(nested.as_proxy().map(Reactive::mode), Some(ReactiveMode::Mutable));

        let (_runner, runs) = counting_effect(&state, |s| {
            if let Some(proxy) = s.get("inner").as_proxy() {
                proxy.get("n");
            }
        });

        reactive(inner).set("n", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_rejects_writes_at_every_depth() {
        let target = Target::new()
            .with("a", 1)
            .with("nested", Target::new().with("b", 2));
        let view = readonly(target.clone());

        assert!(!view.set("a", 5));
        assert!(!view.delete("a"));
        assert_eq!(target.get_raw("a"), Some(Value::from(1)));

        let nested = view.get("nested");
        let nested = nested.as_proxy().unwrap();
        assert!(nested.is_readonly());
        assert!(!nested.set("b", 3));
    }

    #[test]
    fn readonly_reads_are_not_tracked() {
        let target = Target::new().with("a", 1);
        let view = readonly(target.clone());
        let (_runner, runs) = counting_effect(&view, |s| {
            s.get("a");
        });

        reactive(target).set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shallow_readonly_returns_raw_nested_values() {
        let nested = Target::new().with("b", 2);
        let view = shallow_readonly(Target::new().with("nested", nested.clone()));

        let value = view.get("nested");
        assert!(matches!(&value, Value::Object(t) if t.ptr_eq(&nested)));
        assert!(!view.set("nested", 1));
    }

    #[test]
    fn refs_are_unwrapped_and_written_through() {
        let count = Ref::new(1);
        let state = reactive(Target::new().with("count", count.clone()));

        assert_eq!(state.get("count"), Value::from(1));

        state.set("count", 10);
        assert_eq!(count.get_untracked(), Value::from(10));
        assert!(matches!(state.to_raw().get_raw("count"), Some(Value::Ref(_))));

        let (_runner, runs) = counting_effect(&state, |s| {
            s.get("count");
        });
        count.set(11);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn adding_a_key_triggers_iteration() {
        let state = reactive(Target::new());
        let (_runner, runs) = counting_effect(&state, |s| {
            s.keys();
        });

        state.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Overwriting an existing key leaves the key set alone.
        state.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(state.delete("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rewrapping_is_equivalent() {
        let target = Target::new();
        assert!(reactive(target.clone()).same(&reactive(target.clone())));
        assert!(!reactive(target.clone()).same(&readonly(target)));
    }
}
