//! Virtual nodes.
//!
//! A [`VNode`] describes one node of the tree a render pass wants. Each kind
//! carries only the fields that make sense for it:
//!
//! - `Element`: a host element with props and children
//! - `Component`: a component definition with props and slots
//! - `Text`: a host text node
//! - `Fragment`: a list of siblings with no host node of its own
//!
//! Vnodes are rebuilt on every render pass. After a pass, the only state
//! carried forward is the host handle (`el`) and the component instance.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::component::{Component, ComponentInstance};
use super::host::HostNode;
use crate::reactive::{to_display_string, Key, Value};

/// Element or component properties, in declaration order.
pub type Props = IndexMap<Key, Value>;

/// Named slot functions of a component vnode.
pub type Slots = IndexMap<Key, Slot>;

/// A slot: produces child vnodes from slot props.
#[derive(Clone)]
pub struct Slot(Arc<dyn Fn(&Props) -> Vec<VNode> + Send + Sync>);

impl Slot {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Props) -> Vec<VNode> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, props: &Props) -> Vec<VNode> {
        (self.0)(props)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Slot(..)")
    }
}

/// Children of an element.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    Empty,
    Text(Arc<str>),
    List(Vec<VNode>),
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(Arc::from(text))
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(Arc::from(text))
    }
}

impl From<Vec<VNode>> for Children {
    fn from(list: Vec<VNode>) -> Self {
        Children::List(list)
    }
}

#[derive(Debug, Clone)]
pub enum VNodeKind {
    Element {
        tag: Arc<str>,
        props: Props,
        children: Children,
    },
    Component {
        def: Arc<Component>,
        props: Props,
        slots: Slots,
    },
    Text(Arc<str>),
    Fragment(Vec<VNode>),
}

/// Node kind, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Element,
    Component,
    Text,
    Fragment,
}

/// A node of a virtual tree.
#[derive(Clone)]
pub struct VNode {
    pub kind: VNodeKind,
    /// Identity across render passes, for list reconciliation.
    pub key: Option<Key>,
    /// Host node, once mounted. Components point at their subtree's first
    /// host node; fragments have none.
    pub el: Option<HostNode>,
    pub component: Option<Arc<ComponentInstance>>,
}

impl VNode {
    fn from_kind(kind: VNodeKind) -> Self {
        Self {
            kind,
            key: None,
            el: None,
            component: None,
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::from_kind(VNodeKind::Element {
            tag: Arc::from(tag),
            props: Props::new(),
            children: Children::Empty,
        })
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::from_kind(VNodeKind::Text(text.into()))
    }

    pub fn fragment(children: Vec<VNode>) -> Self {
        Self::from_kind(VNodeKind::Fragment(children))
    }

    pub fn component(def: impl Into<Arc<Component>>) -> Self {
        Self::from_kind(VNodeKind::Component {
            def: def.into(),
            props: Props::new(),
            slots: Slots::new(),
        })
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add a prop. A prop named `key` sets the vnode key instead.
    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if key == "key" {
            self.key = Some(Key::from(to_display_string(&value)));
            return self;
        }
        match &mut self.kind {
            VNodeKind::Element { props, .. } | VNodeKind::Component { props, .. } => {
                props.insert(Key::from(key), value);
            }
            VNodeKind::Text(_) | VNodeKind::Fragment(_) => {}
        }
        self
    }

    pub fn with_props<I, K, V>(self, props: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        props
            .into_iter()
            .fold(self, |node, (k, v)| node.with_prop(k.as_ref(), v))
    }

    /// Set text children of an element.
    pub fn with_text(self, text: &str) -> Self {
        self.with_children(Children::from(text))
    }

    /// Set the children of an element, or the members of a fragment.
    pub fn with_children(mut self, children: impl Into<Children>) -> Self {
        match (&mut self.kind, children.into()) {
            (VNodeKind::Element { children: slot, .. }, children) => *slot = children,
            (VNodeKind::Fragment(list), Children::List(children)) => *list = children,
            (VNodeKind::Fragment(list), Children::Text(text)) => *list = vec![VNode::text(text)],
            _ => {}
        }
        self
    }

    /// Add a named slot to a component vnode.
    pub fn with_slot<F>(mut self, name: &str, slot: F) -> Self
    where
        F: Fn(&Props) -> Vec<VNode> + Send + Sync + 'static,
    {
        if let VNodeKind::Component { slots, .. } = &mut self.kind {
            slots.insert(Key::from(name), Slot::new(slot));
        }
        self
    }

    pub fn shape(&self) -> Shape {
        match self.kind {
            VNodeKind::Element { .. } => Shape::Element,
            VNodeKind::Component { .. } => Shape::Component,
            VNodeKind::Text(_) => Shape::Text,
            VNodeKind::Fragment(_) => Shape::Fragment,
        }
    }

    /// Same kind, same element tag or component definition, and same key.
    pub fn same_type(&self, other: &VNode) -> bool {
        let kind_matches = match (&self.kind, &other.kind) {
            (VNodeKind::Element { tag: a, .. }, VNodeKind::Element { tag: b, .. }) => a == b,
            (VNodeKind::Component { def: a, .. }, VNodeKind::Component { def: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (VNodeKind::Text(_), VNodeKind::Text(_)) => true,
            (VNodeKind::Fragment(_), VNodeKind::Fragment(_)) => true,
            _ => false,
        };
        kind_matches && self.key == other.key
    }

    pub fn props(&self) -> Option<&Props> {
        match &self.kind {
            VNodeKind::Element { props, .. } | VNodeKind::Component { props, .. } => Some(props),
            VNodeKind::Text(_) | VNodeKind::Fragment(_) => None,
        }
    }

    /// The first host node this vnode owns, in document order.
    pub fn first_host_node(&self) -> Option<HostNode> {
        match &self.kind {
            VNodeKind::Fragment(children) => children.iter().find_map(VNode::first_host_node),
            VNodeKind::Component { .. } => match &self.component {
                Some(instance) => instance.first_host_node(),
                None => self.el,
            },
            VNodeKind::Element { .. } | VNodeKind::Text(_) => self.el,
        }
    }

    /// Every top-level host node this vnode owns, in document order.
    pub fn host_nodes(&self) -> Vec<HostNode> {
        let mut out = Vec::new();
        self.collect_host_nodes(&mut out);
        out
    }

    pub(crate) fn collect_host_nodes(&self, out: &mut Vec<HostNode>) {
        match &self.kind {
            VNodeKind::Fragment(children) => {
                for child in children {
                    child.collect_host_nodes(out);
                }
            }
            VNodeKind::Component { .. } => match &self.component {
                Some(instance) => instance.collect_host_nodes(out),
                None => out.extend(self.el),
            },
            VNodeKind::Element { .. } | VNodeKind::Text(_) => out.extend(self.el),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("el", &self.el)
            .finish()
    }
}

/// Build an element vnode.
pub fn h(tag: &str, props: Props, children: impl Into<Children>) -> VNode {
    create_element_vnode(tag, props, children)
}

/// Build an element vnode. This is the helper generated render code calls.
pub fn create_element_vnode(tag: &str, props: Props, children: impl Into<Children>) -> VNode {
    VNode::element(tag).with_props(props).with_children(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prop_becomes_the_vnode_key() {
        let node = VNode::element("li").with_prop("key", "a").with_prop("class", "item");
        assert_eq!(node.key.as_deref(), Some("a"));
        assert!(!node.props().unwrap().contains_key("key"));
        assert!(node.props().unwrap().contains_key("class"));

        let numbered = VNode::element("li").with_prop("key", 3);
        assert_eq!(numbered.key.as_deref(), Some("3"));
    }

    #[test]
    fn same_type_compares_tag_and_key() {
        let a = VNode::element("li").with_key("a");
        assert!(a.same_type(&VNode::element("li").with_key("a")));
        assert!(!a.same_type(&VNode::element("li").with_key("b")));
        assert!(!a.same_type(&VNode::element("p").with_key("a")));
        assert!(VNode::text("x").same_type(&VNode::text("y")));
        assert!(!VNode::text("x").same_type(&VNode::fragment(vec![])));
    }

    #[test]
    fn same_type_compares_component_identity() {
        let def = Arc::new(Component::new("Item"));
        let other = Arc::new(Component::new("Item"));
        assert!(VNode::component(def.clone()).same_type(&VNode::component(def.clone())));
        assert!(!VNode::component(def).same_type(&VNode::component(other)));
    }

    #[test]
    fn h_builds_elements() {
        let mut props = Props::new();
        props.insert(Key::from("id"), Value::from("root"));
        let node = h("div", props, vec![VNode::text("hi")]);

        assert_eq!(node.shape(), Shape::Element);
        match &node.kind {
            VNodeKind::Element { tag, children: Children::List(list), .. } => {
                assert_eq!(tag.as_ref(), "div");
                assert_eq!(list.len(), 1);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn unmounted_vnodes_own_no_host_nodes() {
        let tree = VNode::fragment(vec![VNode::text("a"), VNode::element("b")]);
        assert_eq!(tree.first_host_node(), None);
        assert!(tree.host_nodes().is_empty());
    }
}
