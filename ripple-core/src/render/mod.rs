//! Rendering Pipeline
//!
//! This module turns vnode trees into host mutations.
//!
//! # Components
//!
//! - `vnode`: the virtual tree and its builders
//! - `host`: the adapter contract real hosts implement
//! - `memory`: an in-memory host with an operation log
//! - `renderer`: mounting, patching and keyed list reconciliation
//! - `sequence`: longest increasing subsequence for move minimization
//! - `component`: component definitions, instances and their contexts
//! - `app`: mounting a root component

mod app;
mod component;
mod host;
mod memory;
mod renderer;
mod sequence;
mod vnode;

pub use app::App;
pub use component::{
    current_instance, Component, ComponentInstance, InstanceId, RenderContext, RenderFn,
    SetupContext, SetupFn,
};
pub use host::{event_name, is_event_key, HostAdapter, HostNode};
pub use memory::{HostOp, MemoryHost};
pub use renderer::Renderer;
pub use sequence::longest_increasing_subsequence;
pub use vnode::{create_element_vnode, h, Children, Props, Shape, Slot, Slots, VNode, VNodeKind};
