//! Job definition: the unit of work a trigger causes to execute.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: Key,
    /// Reference to the job implementation; resolved by the host scheduler.
    pub job_class: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Opaque per-job data handed to executions.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// A durable job survives with no active triggers; a non-durable one is
    /// deleted when its last trigger completes.
    #[serde(default)]
    pub durable: bool,
    /// At most one execution of this job may run cluster-wide at a time.
    #[serde(default)]
    pub concurrent_execution_disallowed: bool,
    /// Re-fire through a one-shot recovery trigger after a node crash
    /// mid-execution.
    #[serde(default)]
    pub requests_recovery: bool,
}

impl JobDetail {
    pub fn new(key: Key, job_class: impl Into<String>) -> Self {
        Self {
            key,
            job_class: job_class.into(),
            description: None,
            data: Map::new(),
            durable: false,
            concurrent_execution_disallowed: false,
            requests_recovery: false,
        }
    }
}
