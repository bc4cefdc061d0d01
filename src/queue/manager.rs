//! Queue job CRUD over the shared collections.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::cluster::{ClusterBackend, ClusterLock, LockGuard, SharedMap, StorageError};
use crate::config::{QueueConfig, StoreConfig};
use crate::error::{Result, SchedulerError};
use crate::model::{now_ms, Key, QueueJobDetail};

use super::pending::{PendingEntry, PendingSet};

const QUEUE_JOBS_MAP: &str = "queue-jobs";
const QUEUE_PENDING_SET: &str = "queue-pending";
const QUEUE_LOCK: &str = "queue-lock";

/// Stored form of a queue job: the definition snapshot plus its insertion
/// sequence, which survives updates so reprioritized jobs keep their place
/// among equals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJobRecord {
    detail: QueueJobDetail,
    seq: u64,
    enqueued_at: u64,
}

impl QueueJobRecord {
    fn new(detail: QueueJobDetail, seq: u64, enqueued_at: u64) -> Self {
        Self {
            detail,
            seq,
            enqueued_at,
        }
    }

    pub fn key(&self) -> &Key {
        &self.detail.key
    }

    pub fn priority(&self) -> i32 {
        self.detail.priority
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Independent copy of the definition snapshot.
    pub fn detail_clone(&self) -> QueueJobDetail {
        self.detail.clone()
    }

    /// Replace the definition wholesale and re-publish, keeping the
    /// insertion sequence.
    fn set_detail(
        &mut self,
        detail: QueueJobDetail,
        map: &SharedMap<Key, QueueJobRecord>,
    ) -> std::result::Result<(), StorageError> {
        self.detail = detail;
        map.put(&self.detail.key, self)
    }

    fn pending_entry(&self) -> PendingEntry {
        PendingEntry {
            priority: self.detail.priority,
            seq: self.seq,
            key: self.detail.key.clone(),
        }
    }
}

impl PartialEq for QueueJobRecord {
    fn eq(&self, other: &Self) -> bool {
        self.detail.key == other.detail.key
    }
}

impl Eq for QueueJobRecord {}

impl Hash for QueueJobRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.detail.key.hash(state);
    }
}

/// Manager for the priority-ordered immediate-execution backlog.
///
/// FIFO among equal priorities is exact per node and monotonic-timestamp
/// approximate across nodes: sequence numbers are epoch millis shifted
/// left 16 bits, or-ed with a per-node counter.
pub struct QueueJobManager {
    pub(crate) config: QueueConfig,
    pub(crate) jobs: SharedMap<Key, QueueJobRecord>,
    pub(crate) pending: PendingSet,
    lock: Arc<dyn ClusterLock>,
    seq_counter: AtomicU64,
    pub(crate) notify: Notify,
    shutdown: AtomicBool,
}

impl QueueJobManager {
    pub fn new(
        backend: Arc<dyn ClusterBackend>,
        store_config: &StoreConfig,
        config: QueueConfig,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            jobs: SharedMap::new(backend.map(&store_config.collection(QUEUE_JOBS_MAP))),
            pending: PendingSet::new(backend.sorted_set(&store_config.collection(QUEUE_PENDING_SET))),
            lock: backend.lock(&store_config.collection(QUEUE_LOCK)),
            seq_counter: AtomicU64::new(0),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            config,
        });
        info!(store = %store_config.store_name, "Queue job manager initialized");
        manager
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = LockGuard::acquire(&*self.lock, self.config.lock_timeout)
            .map_err(SchedulerError::from)?;
        f()
    }

    fn next_seq(&self) -> u64 {
        (now_ms() << 16) | (self.seq_counter.fetch_add(1, Ordering::Relaxed) & 0xFFFF)
    }

    /// Insert a new queue job; fails with `DuplicateKey` when the identity
    /// already exists.
    pub fn add_queue_job_detail(&self, detail: QueueJobDetail) -> Result<()> {
        self.with_lock(|| {
            if self.jobs.contains(&detail.key)? {
                return Err(SchedulerError::DuplicateKey(format!(
                    "queue job {} already exists",
                    detail.key
                )));
            }
            let key = detail.key.clone();
            let record = QueueJobRecord::new(detail, self.next_seq(), now_ms());
            self.jobs.put(&key, &record)?;
            self.pending.insert(&record.pending_entry())?;
            debug!(job = %key, priority = record.priority(), "Added queue job");
            Ok(())
        })?;
        self.notify.notify_one();
        Ok(())
    }

    /// Delete a queue job; fails with `NotFound` when absent. An in-flight
    /// execution is unaffected, but the identity can never dispatch again.
    pub fn remove_queue_job_detail(&self, key: &Key) -> Result<()> {
        self.with_lock(|| {
            let Some(record) = self.jobs.remove(key)? else {
                return Err(SchedulerError::NotFound(format!(
                    "queue job {} not found",
                    key
                )));
            };
            // a dispatched job is already off the pending set
            self.pending.remove(&record.pending_entry())?;
            debug!(job = %key, "Removed queue job");
            Ok(())
        })
    }

    /// Atomically replace the stored snapshot for an existing identity;
    /// fails with `NotFound` when absent. A dispatch that already captured
    /// the prior snapshot completes with it, never a partial merge.
    pub fn update_queue_job_detail(&self, detail: QueueJobDetail) -> Result<()> {
        self.with_lock(|| {
            let Some(mut record) = self.jobs.get(&detail.key)? else {
                return Err(SchedulerError::NotFound(format!(
                    "queue job {} not found",
                    detail.key
                )));
            };
            let was_pending = self.pending.remove(&record.pending_entry())?;
            record.set_detail(detail, &self.jobs)?;
            if was_pending {
                self.pending.insert(&record.pending_entry())?;
            }
            debug!(job = %record.key(), "Updated queue job");
            Ok(())
        })?;
        self.notify.notify_one();
        Ok(())
    }

    /// Independent copy of a stored queue job.
    pub fn get_queue_job_detail(&self, key: &Key) -> Result<Option<QueueJobDetail>> {
        Ok(self.jobs.get(key)?.map(|r| r.detail_clone()))
    }

    pub fn check_queue_job_exists(&self, key: &Key) -> Result<bool> {
        Ok(self.jobs.contains(key)?)
    }

    /// Point-in-time snapshot of identities. Enumeration is consistent
    /// with, but not synchronized against, concurrent mutation.
    pub fn get_queue_job_keys(&self) -> Result<Vec<Key>> {
        Ok(self.jobs.keys()?)
    }

    /// Number of jobs not yet handed to a worker.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.pending.len()?)
    }

    /// Take the highest-priority pending job. Removal from the pending set
    /// happens here, at hand-off, so the same identity is never dispatched
    /// twice concurrently.
    pub(crate) fn claim_next(&self) -> Result<Option<QueueJobDetail>> {
        self.with_lock(|| loop {
            let Some(entry) = self.pending.pop_first()? else {
                return Ok(None);
            };
            // the record may have been removed since the entry was queued
            match self.jobs.get(&entry.key)? {
                Some(record) => return Ok(Some(record.detail_clone())),
                None => continue,
            }
        })
    }

    /// Stop accepting dispatches and wake anything parked on the backlog.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}
