//! Queue subsystem tests, running against the in-process backend.

mod crud;

use std::sync::Arc;

use crate::cluster::MemoryBackend;
use crate::config::{QueueConfig, StoreConfig};
use crate::error::SchedulerError;
use crate::model::{Key, QueueJobDetail};

use super::QueueJobManager;

fn setup() -> Arc<QueueJobManager> {
    setup_with_workers(4)
}

fn setup_with_workers(worker_count: usize) -> Arc<QueueJobManager> {
    let store_config = StoreConfig {
        store_name: "test".to_string(),
        ..StoreConfig::default()
    };
    let config = QueueConfig {
        worker_count,
        ..QueueConfig::default()
    };
    QueueJobManager::new(MemoryBackend::new(), &store_config, config)
}

fn queue_job(name: &str, priority: i32) -> QueueJobDetail {
    let mut job = QueueJobDetail::new(Key::of(name), "noop");
    job.priority = priority;
    job
}
