//! Code generation.
//!
//! A transformed tree is lowered two ways:
//!
//! - [`generate`] prints the render function as source text, for
//!   inspection and snapshot tests.
//! - [`render_fn`] builds an executable [`RenderFn`] that walks the tree
//!   against a [`RenderContext`] on every render.
//!
//! Both produce the same shape: one root node renders as itself, several
//! roots render as a fragment (an array literal in source form). An element
//! whose only child is text-like gets text children.

use std::sync::Arc;

use serde::Serialize;

use super::ast::{Element, Node, Root};
use super::transform::Transformed;
use crate::reactive::{to_display_string, Key, Value};
use crate::render::{create_element_vnode, Children, Props, RenderContext, RenderFn, VNode};

/// Generated render function source and the helpers it imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodegenResult {
    pub code: String,
    pub helpers: Vec<&'static str>,
}

struct CodegenContext {
    code: String,
}

impl CodegenContext {
    fn push(&mut self, source: &str) {
        self.code.push_str(source);
    }
}

pub fn generate(transformed: &Transformed) -> CodegenResult {
    let helpers: Vec<&'static str> = transformed.helpers.iter().map(|h| h.name()).collect();
    let mut ctx = CodegenContext {
        code: String::new(),
    };

    if !helpers.is_empty() {
        let aliases: Vec<String> = helpers.iter().map(|h| format!("{h}: _{h}")).collect();
        ctx.push(&format!("const {{ {} }} = Vue", aliases.join(", ")));
    }
    ctx.push("\n");
    ctx.push("return ");
    ctx.push("function render(_ctx, _cache){");
    ctx.push("return ");
    match transformed.root.children.as_slice() {
        [only] => gen_node(only, &mut ctx),
        many => gen_list(many, &mut ctx),
    }
    ctx.push("}");

    CodegenResult {
        code: ctx.code,
        helpers,
    }
}

fn gen_node(node: &Node, ctx: &mut CodegenContext) {
    match node {
        Node::Element(element) => gen_element(element, ctx),
        Node::Text { content } => ctx.push(&quote(content)),
        Node::Interpolation { expression } => {
            ctx.push("_toDisplayString(_ctx.");
            ctx.push(expression);
            ctx.push(")");
        }
        Node::Compound { parts } => {
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    ctx.push(" + ");
                }
                gen_node(part, ctx);
            }
        }
    }
}

fn gen_element(element: &Element, ctx: &mut CodegenContext) {
    ctx.push("_createElementVNode(");
    ctx.push(&quote(&element.tag));
    ctx.push(", ");

    if element.attrs.is_empty() {
        ctx.push("null");
    } else {
        let props: Vec<String> = element
            .attrs
            .iter()
            .map(|attr| format!("{}: {}", quote(&attr.name), quote(&attr.value)))
            .collect();
        ctx.push(&format!("{{ {} }}", props.join(", ")));
    }
    ctx.push(", ");

    match element.children.as_slice() {
        [] => ctx.push("null"),
        [only] if only.is_text_like() => gen_node(only, ctx),
        many => gen_list(many, ctx),
    }
    ctx.push(")");
}

fn gen_list(nodes: &[Node], ctx: &mut CodegenContext) {
    ctx.push("[");
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            ctx.push(", ");
        }
        gen_node(node, ctx);
    }
    ctx.push("]");
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Build the executable render function for a transformed tree.
pub fn render_fn(root: Root) -> RenderFn {
    let root = Arc::new(root);
    Arc::new(move |ctx: &RenderContext| match root.children.as_slice() {
        [only] => build_node(only, ctx),
        many => VNode::fragment(many.iter().map(|node| build_node(node, ctx)).collect()),
    })
}

fn build_node(node: &Node, ctx: &RenderContext) -> VNode {
    match node {
        Node::Element(element) => build_element(element, ctx),
        text_like => VNode::text(display(text_like, ctx)),
    }
}

fn build_element(element: &Element, ctx: &RenderContext) -> VNode {
    let props: Props = element
        .attrs
        .iter()
        .map(|attr| (Key::from(attr.name.as_str()), Value::from(attr.value.as_str())))
        .collect();

    let children = match element.children.as_slice() {
        [] => Children::Empty,
        [only] if only.is_text_like() => Children::from(display(only, ctx)),
        many => Children::List(many.iter().map(|node| build_node(node, ctx)).collect()),
    };

    create_element_vnode(&element.tag, props, children)
}

fn display(node: &Node, ctx: &RenderContext) -> String {
    match node {
        Node::Text { content } => content.clone(),
        Node::Interpolation { expression } => to_display_string(&ctx.path(expression)),
        Node::Compound { parts } => parts.iter().map(|part| display(part, ctx)).collect(),
        Node::Element(_) => String::new(),
    }
}
