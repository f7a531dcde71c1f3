//! In-memory host.
//!
//! [`MemoryHost`] implements [`HostAdapter`] over a plain node table. It
//! records every adapter call in an operation log, serializes subtrees to
//! HTML and can dispatch events to registered listeners, which makes it the
//! host of choice for tests and headless rendering.
//!
//! Removed nodes are released together with their descendants, as are the
//! children [`HostAdapter::set_element_text`] replaces, so the node table
//! only holds what is attached or not yet inserted.

use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::host::{event_name, is_event_key, HostAdapter, HostNode};
use crate::reactive::{to_display_string, Handler, Value};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    /// `value` is the display form of the new value; `None` for removals.
    PatchProp { node: HostNode, key: String, value: Option<String> },
    Insert { child: HostNode, parent: HostNode, anchor: Option<HostNode> },
    Remove { node: HostNode },
    SetElementText { node: HostNode, text: String },
    SetText { node: HostNode, text: String },
}

#[derive(Debug)]
enum NodeData {
    Element { tag: String },
    Text { text: String },
}

#[derive(Debug)]
struct MemNode {
    data: NodeData,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    attrs: IndexMap<String, String>,
    listeners: IndexMap<String, Handler>,
}

impl MemNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    nodes: HashMap<HostNode, MemNode>,
    ops: Vec<HostOp>,
}

impl HostState {
    fn alloc(&mut self, data: NodeData) -> HostNode {
        let node = HostNode::from_raw(self.next_id);
        self.next_id += 1;
        self.nodes.insert(node, MemNode::new(data));
        node
    }

    fn detach(&mut self, node: HostNode) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&c| c != node);
        }
    }

    /// Forget a node and everything below it.
    fn release(&mut self, node: HostNode) {
        let mut pending = vec![node];
        while let Some(next) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                pending.extend(removed.children);
            }
        }
    }

    fn write_html(&self, node: HostNode, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.data {
            NodeData::Text { text } => out.push_str(&escape(text)),
            NodeData::Element { tag } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &n.attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                out.push('>');
                for &child in &n.children {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A host whose nodes live in memory.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container element. Not recorded in the operation log.
    pub fn create_root(&self) -> HostNode {
        self.state.lock().alloc(NodeData::Element {
            tag: "div".to_string(),
        })
    }

    /// Every operation recorded so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.state.lock().ops.clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.state.lock().ops)
    }

    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// HTML of a node's children.
    pub fn inner_html(&self, node: HostNode) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        if let Some(n) = state.nodes.get(&node) {
            for &child in &n.children {
                state.write_html(child, &mut out);
            }
        }
        out
    }

    /// HTML of a node, including the node itself.
    pub fn to_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.state.lock().write_html(node, &mut out);
        out
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.state
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of nodes the host still holds, roots included.
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.state.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn tag(&self, node: HostNode) -> Option<String> {
        match &self.state.lock().nodes.get(&node)?.data {
            NodeData::Element { tag } => Some(tag.clone()),
            NodeData::Text { .. } => None,
        }
    }

    pub fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        self.state.lock().nodes.get(&node)?.attrs.get(name).cloned()
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, node: HostNode) -> String {
        fn collect(state: &HostState, node: HostNode, out: &mut String) {
            let Some(n) = state.nodes.get(&node) else {
                return;
            };
            match &n.data {
                NodeData::Text { text } => out.push_str(text),
                NodeData::Element { .. } => {
                    for &child in &n.children {
                        collect(state, child, out);
                    }
                }
            }
        }

        let state = self.state.lock();
        let mut out = String::new();
        collect(&state, node, &mut out);
        out
    }

    pub fn has_listener(&self, node: HostNode, event: &str) -> bool {
        self.state
            .lock()
            .nodes
            .get(&node)
            .is_some_and(|n| n.listeners.contains_key(event))
    }

    /// Call the listener registered for `event` on `node`.
    ///
    /// Returns `false` when no listener is registered.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        let handler = self
            .state
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.listeners.get(event).cloned());

        // The listener may write state that re-enters the host.
        match handler {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let mut state = self.state.lock();
        let node = state.alloc(NodeData::Element {
            tag: tag.to_string(),
        });
        state.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&self, text: &str) -> HostNode {
        let mut state = self.state.lock();
        let node = state.alloc(NodeData::Text {
            text: text.to_string(),
        });
        state.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn patch_prop(&self, el: HostNode, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        let mut state = self.state.lock();
        state.ops.push(HostOp::PatchProp {
            node: el,
            key: key.to_string(),
            value: next.map(to_display_string),
        });

        let Some(node) = state.nodes.get_mut(&el) else {
            return;
        };

        if let Some(event) = event_name(key) {
            debug_assert!(is_event_key(key));
            match next.and_then(Value::as_handler) {
                Some(handler) => {
                    node.listeners.insert(event, handler.clone());
                }
                None => {
                    node.listeners.shift_remove(&event);
                }
            }
            return;
        }

        match next {
            None | Some(Value::Null) => {
                node.attrs.shift_remove(key);
            }
            Some(value) => {
                node.attrs.insert(key.to_string(), to_display_string(value));
            }
        }
    }

    fn insert(&self, child: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let mut state = self.state.lock();
        state.ops.push(HostOp::Insert {
            child,
            parent,
            anchor,
        });

        if !state.nodes.contains_key(&child) {
            return;
        }
        state.detach(child);
        let Some(p) = state.nodes.get_mut(&parent) else {
            return;
        };
        let position = anchor
            .and_then(|a| p.children.iter().position(|&c| c == a))
            .unwrap_or(p.children.len());
        p.children.insert(position, child);
        if let Some(c) = state.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn remove(&self, child: HostNode) {
        let mut state = self.state.lock();
        state.ops.push(HostOp::Remove { node: child });
        state.detach(child);
        state.release(child);
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let state = self.state.lock();
        let parent = state.nodes.get(&node)?.parent?;
        let siblings = &state.nodes.get(&parent)?.children;
        let position = siblings.iter().position(|&c| c == node)?;
        siblings.get(position + 1).copied()
    }

    fn set_element_text(&self, el: HostNode, text: &str) {
        let mut state = self.state.lock();
        state.ops.push(HostOp::SetElementText {
            node: el,
            text: text.to_string(),
        });

        let old = state
            .nodes
            .get_mut(&el)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in old {
            state.release(child);
        }

        if !text.is_empty() && state.nodes.contains_key(&el) {
            let node = state.alloc(NodeData::Text {
                text: text.to_string(),
            });
            if let Some(c) = state.nodes.get_mut(&node) {
                c.parent = Some(el);
            }
            if let Some(n) = state.nodes.get_mut(&el) {
                n.children.push(node);
            }
        }
    }

    fn set_text(&self, node: HostNode, text: &str) {
        let mut state = self.state.lock();
        state.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
        if let Some(MemNode {
            data: NodeData::Text { text: current },
            ..
        }) = state.nodes.get_mut(&node)
        {
            *current = text.to_string();
        }
    }
}
