//! Template Compiler
//!
//! Turns template text into a render function.
//!
//! # How It Works
//!
//! 1. `parse` builds a syntax tree of elements, text and `{{ }}`
//!    interpolations
//! 2. `transform` merges adjacent text into compound nodes and records the
//!    runtime helpers the output needs
//! 3. `codegen` lowers the tree either to source text ([`generate`]) or to
//!    an executable [`RenderFn`] ([`compile`])
//!
//! Generated code references exactly two helpers: `toDisplayString` and
//! `createElementVNode`. The executable form calls their Rust counterparts,
//! [`to_display_string`](crate::reactive::to_display_string) and
//! [`create_element_vnode`](crate::render::create_element_vnode).
//!
//! Interpolations are dotted property paths resolved through
//! [`RenderContext::path`](crate::render::RenderContext::path), so every
//! read is tracked by the component's render effect.

pub mod ast;
mod codegen;
mod parse;
mod transform;

use thiserror::Error;
use tracing::debug;

pub use codegen::CodegenResult;
pub use parse::parse;
pub use transform::{transform, Transformed};

use crate::render::RenderFn;

/// Structural template errors. Compilation stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("missing end tag for <{tag}>")]
    MissingEndTag { tag: String },

    #[error("unexpected end tag </{tag}>")]
    UnexpectedEndTag { tag: String },

    #[error("start tag <{tag}> is never closed with '>'")]
    UnterminatedStartTag { tag: String },

    #[error("interpolation at byte {offset} is missing its closing '}}}}'")]
    UnterminatedInterpolation { offset: usize },

    #[error("template is empty")]
    EmptyTemplate,
}

/// Compile a template into an executable render function.
pub fn compile(template: &str) -> Result<RenderFn, CompileError> {
    let transformed = transform(parse(template)?);
    debug!(
        roots = transformed.root.children.len(),
        helpers = ?transformed.helpers,
        "template compiled"
    );
    Ok(codegen::render_fn(transformed.root))
}

/// Generate the render function's source text.
pub fn generate(template: &str) -> Result<CodegenResult, CompileError> {
    let transformed = transform(parse(template)?);
    Ok(codegen::generate(&transformed))
}
