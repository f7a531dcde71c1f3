//! Runtime configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all) is
//! enough to build a renderer.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default number of times one job may run within a single flush.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batching queue settings.
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings for the batching queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How many times a single job may run within one flush before it is
    /// dropped for the rest of that flush.
    pub recursion_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}
