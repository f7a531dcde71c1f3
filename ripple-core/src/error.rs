//! Error types shared across the crate.
//!
//! Only fatal conditions are errors. Contract violations that the runtime
//! tolerates (such as writing through a read-only wrapper) are logged with
//! `tracing` instead and never surface here.

use thiserror::Error;

use crate::compiler::CompileError;

/// Errors produced by the Ripple runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A template failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// No tokio runtime is available to defer work onto.
    #[error("no tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    /// `App::mount` was called on an app that is already mounted.
    #[error("app is already mounted")]
    AlreadyMounted,

    /// `App::unmount` was called on an app that was never mounted.
    #[error("app is not mounted")]
    NotMounted,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
