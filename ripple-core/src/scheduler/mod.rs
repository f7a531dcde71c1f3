//! Update Scheduling
//!
//! Reactive writes do not re-render components directly. The render effect's
//! scheduler queues the component's update job on a [`JobQueue`], which
//! deduplicates it and flushes once per deferred tick.
//!
//! # Components
//!
//! - `queue`: the job queue and job identities
//! - `defer`: the "run later" capability the queue books its flush with

mod defer;
mod queue;

pub use defer::{Defer, Deferred, ManualTicker, TokioDefer};
pub use queue::{Job, JobId, JobQueue};
