//! Reactive Primitives
//!
//! This module implements the reactive data layer: dependency tracking,
//! reactive wrappers, refs, computeds and effects.
//!
//! # Concepts
//!
//! ## Wrappers
//!
//! A [`Reactive`] wraps a [`Target`] (a shared record of [`Value`]s). Reads
//! through a mutable wrapper register the running computation against the
//! (target, key) pair; writes notify every computation registered there.
//! Read-only wrappers reject writes with a warning instead.
//!
//! ## Refs
//!
//! A [`Ref`] is a single-value container with the same tracking semantics.
//! A ref stored inside a reactive target is unwrapped on read.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result and re-evaluates
//! only when read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An effect is a [`Subscriber`] that runs immediately and re-runs (or calls
//! its scheduler) whenever its dependencies change.
//!
//! # Implementation Notes
//!
//! The running computation is found through a thread-local context stack.
//! When a tracked value is read, the top of the stack (if tracking) is added
//! to the value's [`Dep`].

mod computed;
mod context;
mod dep;
mod effect;
mod ref_cell;
mod runtime;
mod subscriber;
mod value;
mod wrapper;

pub use computed::{Computed, ComputedState};
pub use context::{untracked, ReactiveContext};
pub use dep::Dep;
pub use effect::{effect, effect_with, stop, EffectOptions};
pub use ref_cell::{is_ref, unref, Ref};
pub use runtime::Runtime;
pub use subscriber::{Subscriber, SubscriberId};
pub use value::{to_display_string, Handler, Key, Target, TargetId, Value};
pub use wrapper::{reactive, readonly, shallow_readonly, Reactive, ReactiveMode, ITERATE_KEY};
