//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (wrappers, refs, computeds, effects)
//! - A batching update queue
//! - Virtual nodes, components and a keyed tree diff
//! - A small template compiler
//!
//! Rendering is host-agnostic: every mutation goes through a
//! [`HostAdapter`](render::HostAdapter). [`MemoryHost`](render::MemoryHost)
//! is an in-memory implementation that records each call.
//!
//! # Architecture
//!
//! - `reactive`: dependency tracking and reactive values
//! - `scheduler`: the job queue that batches component updates
//! - `render`: vnodes, components, the renderer and the app entry point
//! - `compiler`: template to render function
//!
//! A write on reactive state notifies the render effects that read it. Each
//! effect queues its component's update job; the queue flushes once per
//! tick, re-rendering each dirty component once and patching the host with
//! the difference.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ripple_core::prelude::*;
//!
//! let host = Arc::new(MemoryHost::new());
//! let ticker = Arc::new(ManualTicker::new());
//! let renderer = Renderer::new(host.clone(), ticker.clone());
//!
//! let state = reactive(Target::from_iter([("message", "mini-vue")]));
//! let component = Component::new("Hello")
//!     .with_setup({
//!         let state = state.clone();
//!         move |_, _| state.to_raw()
//!     })
//!     .with_template("<div>hi, {{message}}</div>")?;
//!
//! let root = host.create_root();
//! renderer.create_app(component).mount(root)?;
//! // <div>hi, mini-vue</div>
//!
//! state.set("message", "ripple");
//! ticker.tick();
//! // <div>hi, ripple</div>
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;
pub mod shared;

pub use config::Config;
pub use error::{Error, Result};

/// The types most applications need.
pub mod prelude {
    pub use crate::compiler::{compile, CompileError};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::reactive::{
        effect, reactive, readonly, shallow_readonly, to_display_string, Computed, Reactive, Ref,
        Target, Value,
    };
    pub use crate::render::{
        h, App, Component, HostAdapter, HostNode, MemoryHost, RenderContext, Renderer,
        SetupContext, VNode,
    };
    pub use crate::scheduler::{Defer, JobQueue, ManualTicker, TokioDefer};
}
