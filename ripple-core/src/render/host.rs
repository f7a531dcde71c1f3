//! Host adapter contract.
//!
//! The diff engine never touches real nodes. Every structural mutation goes
//! through a [`HostAdapter`], which owns the real nodes and hands out opaque
//! [`HostNode`] handles for them.

use std::fmt;

use crate::reactive::Value;

/// Opaque handle to a node owned by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Primitive operations the diff engine needs from a host.
pub trait HostAdapter: Send + Sync {
    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, text: &str) -> HostNode;

    /// Apply, update or remove one property of an element.
    ///
    /// `next == None` means the property was removed. Keys that satisfy
    /// [`is_event_key`] are event subscriptions rather than attributes.
    fn patch_prop(&self, el: HostNode, key: &str, prev: Option<&Value>, next: Option<&Value>);

    /// Insert `child` into `parent` before `anchor`, or append when there is
    /// no anchor. A child that is already attached somewhere moves.
    fn insert(&self, child: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach a node. No-op when it is not attached.
    ///
    /// The renderer never reinserts a removed node, so a host may release it
    /// along with its descendants.
    fn remove(&self, child: HostNode);

    /// The node after `node` under the same parent.
    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    /// Replace every child of an element with the given text.
    fn set_element_text(&self, el: HostNode, text: &str);

    /// Replace the content of a text node.
    fn set_text(&self, node: HostNode, text: &str);
}

/// `on` followed by an uppercase letter: `onClick`, `onAddOne`.
pub fn is_event_key(key: &str) -> bool {
    key.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// The event an event key subscribes to: `onClick` listens for `click`.
pub fn event_name(key: &str) -> Option<String> {
    if is_event_key(key) {
        Some(key[2..].to_lowercase())
    } else {
        None
    }
}
