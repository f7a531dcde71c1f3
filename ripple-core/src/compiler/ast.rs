//! Template syntax tree.

use serde::Serialize;

/// Parsed template: the top-level nodes in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Root {
    pub children: Vec<Node>,
}

/// A template node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Element(Element),
    /// Literal text.
    Text { content: String },
    /// `{{ path }}`, stored trimmed.
    Interpolation { expression: String },
    /// Adjacent text and interpolations merged into one concatenation.
    /// Only produced by the transform pass.
    Compound { parts: Vec<Node> },
}

impl Node {
    /// Text and interpolations (and their compounds) render to a string.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            Node::Text { .. } | Node::Interpolation { .. } | Node::Compound { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

/// A static `name="value"` attribute. Bare attributes carry an empty value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Runtime helpers generated code may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Helper {
    ToDisplayString,
    CreateElementVNode,
}

impl Helper {
    pub fn name(self) -> &'static str {
        match self {
            Helper::ToDisplayString => "toDisplayString",
            Helper::CreateElementVNode => "createElementVNode",
        }
    }
}
