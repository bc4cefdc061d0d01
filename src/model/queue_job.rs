//! Immediate-execution queue job definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Key, DEFAULT_PRIORITY};

/// A job with no time-based schedule. Its only ordering key is priority
/// (higher dispatches first), then insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJobDetail {
    pub key: Key,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub description: Option<String>,
    /// Reference to the job implementation; resolved by the host scheduler.
    pub job_class: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl QueueJobDetail {
    pub fn new(key: Key, job_class: impl Into<String>) -> Self {
        Self {
            key,
            priority: DEFAULT_PRIORITY,
            description: None,
            job_class: job_class.into(),
            data: Map::new(),
        }
    }
}
