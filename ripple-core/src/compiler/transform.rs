//! Transform pass.
//!
//! Merges runs of adjacent text and interpolation children into a single
//! compound node and records which runtime helpers the generated code needs,
//! in first-use order.

use indexmap::IndexSet;

use super::ast::{Helper, Node, Root};

/// A transformed tree plus the helpers its code references.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub root: Root,
    pub helpers: Vec<Helper>,
}

pub fn transform(root: Root) -> Transformed {
    let mut helpers = IndexSet::new();
    let children = transform_children(root.children, &mut helpers);

    Transformed {
        root: Root { children },
        helpers: helpers.into_iter().collect(),
    }
}

fn transform_children(children: Vec<Node>, helpers: &mut IndexSet<Helper>) -> Vec<Node> {
    let children = children
        .into_iter()
        .map(|child| transform_node(child, helpers))
        .collect();
    merge_text(children)
}

fn transform_node(node: Node, helpers: &mut IndexSet<Helper>) -> Node {
    match node {
        Node::Element(mut element) => {
            element.children = transform_children(element.children, helpers);
            // exit hook: the element call is emitted after its children
            helpers.insert(Helper::CreateElementVNode);
            Node::Element(element)
        }
        Node::Interpolation { .. } => {
            helpers.insert(Helper::ToDisplayString);
            node
        }
        Node::Text { .. } | Node::Compound { .. } => node,
    }
}

fn merge_text(children: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());

    for child in children {
        if child.is_text_like() {
            if let Some(prev) = merged.last_mut().filter(|prev| prev.is_text_like()) {
                append_part(prev, child);
                continue;
            }
        }
        merged.push(child);
    }

    merged
}

fn append_part(prev: &mut Node, part: Node) {
    match prev {
        Node::Compound { parts } => parts.push(part),
        _ => {
            let first = std::mem::replace(prev, Node::Compound { parts: Vec::new() });
            *prev = Node::Compound {
                parts: vec![first, part],
            };
        }
    }
}
