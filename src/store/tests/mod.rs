//! Store behavior tests, running against the in-process backend.

mod lifecycle;
mod recovery;

use std::time::Duration;

use crate::cluster::MemoryBackend;
use crate::config::StoreConfig;
use crate::error::SchedulerError;
use crate::model::{JobDetail, Key, MisfirePolicy, TriggerDetail, REPEAT_INDEFINITELY};

use super::{ClusteredJobStore, CompletedInstruction, TriggerState, RECOVERY_GROUP};

fn test_config(node_id: &str) -> StoreConfig {
    StoreConfig {
        store_name: "test".to_string(),
        node_id: Some(node_id.to_string()),
        misfire_threshold: Duration::from_millis(500),
        claim_timeout: Duration::from_secs(1),
        ..StoreConfig::default()
    }
}

fn setup() -> ClusteredJobStore {
    ClusteredJobStore::new(MemoryBackend::new(), test_config("node-a"))
}

/// Two stores over the same backing cluster.
fn cluster_pair() -> (ClusteredJobStore, ClusteredJobStore) {
    let backend = MemoryBackend::new();
    let a = ClusteredJobStore::new(backend.clone(), test_config("node-a"));
    let b = ClusteredJobStore::new(backend, test_config("node-b"));
    (a, b)
}

fn job(name: &str) -> JobDetail {
    JobDetail::new(Key::of(name), "noop")
}

fn trigger(name: &str, job_name: &str, fire_at: u64) -> TriggerDetail {
    TriggerDetail::new(Key::of(name), Key::of(job_name), fire_at)
}
