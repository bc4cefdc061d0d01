//! Entity records stored in the shared maps.
//!
//! Each record pairs an immutable identity with a mutable snapshot. The
//! shared maps hold value snapshots, so a mutation is only visible to other
//! nodes after the whole record is published again; every mutating setter
//! here re-publishes. Equality and hashing cover the key alone, never the
//! mutable snapshot.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cluster::{SharedMap, StorageError};
use crate::model::{JobDetail, Key, TriggerDetail};

/// Trigger lifecycle state. Every valid pause/block combination is a
/// distinct variant; nothing else is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// Eligible for acquisition; present in the time index.
    Waiting,
    /// Claimed by a node, pending fire.
    Acquired,
    /// Terminal; the schedule is exhausted.
    Complete,
    /// Suspended; excluded from the time index.
    Paused,
    /// Held back because its job forbids concurrent execution and another
    /// instance is running.
    Blocked,
    /// Paused and blocked at once.
    PausedBlocked,
    /// Quarantined after a consistency failure; excluded from rotation
    /// until operator intervention.
    Error,
}

/// Stored form of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    job: JobDetail,
}

impl JobRecord {
    pub fn new(job: JobDetail) -> Self {
        Self { job }
    }

    pub fn key(&self) -> &Key {
        &self.job.key
    }

    pub fn durable(&self) -> bool {
        self.job.durable
    }

    pub fn requests_recovery(&self) -> bool {
        self.job.requests_recovery
    }

    pub fn concurrent_execution_disallowed(&self) -> bool {
        self.job.concurrent_execution_disallowed
    }

    /// Independent copy; executing code can never mutate store state.
    pub fn job_detail_clone(&self) -> JobDetail {
        self.job.clone()
    }

    /// Replace the job data map and re-publish.
    pub fn set_data(
        &mut self,
        data: Map<String, Value>,
        map: &SharedMap<Key, JobRecord>,
    ) -> Result<(), StorageError> {
        self.job.data = data;
        map.put(&self.job.key, self)
    }
}

impl PartialEq for JobRecord {
    fn eq(&self, other: &Self) -> bool {
        self.job.key == other.job.key
    }
}

impl Eq for JobRecord {}

impl Hash for JobRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.job.key.hash(state);
    }
}

/// Stored form of a trigger: identity, owning-job back-reference, state,
/// and the embedded schedule payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    key: Key,
    job_key: Key,
    /// Copied from the owning job at registration; never re-derived during
    /// hot-path transitions.
    job_disallows_concurrence: bool,
    state: TriggerState,
    /// Node that last mutated this record; set on every state change.
    last_owner_id: Option<String>,
    trigger: TriggerDetail,
}

impl TriggerRecord {
    pub fn new(trigger: TriggerDetail, job_disallows_concurrence: bool) -> Self {
        Self {
            key: trigger.key.clone(),
            job_key: trigger.job_key.clone(),
            job_disallows_concurrence,
            state: TriggerState::Waiting,
            last_owner_id: None,
            trigger,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn job_key(&self) -> &Key {
        &self.job_key
    }

    pub fn job_disallows_concurrence(&self) -> bool {
        self.job_disallows_concurrence
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn last_owner_id(&self) -> Option<&str> {
        self.last_owner_id.as_deref()
    }

    pub fn next_fire_time(&self) -> Option<u64> {
        self.trigger.next_fire_time
    }

    pub fn priority(&self) -> i32 {
        self.trigger.priority
    }

    pub fn may_fire_again(&self) -> bool {
        self.trigger.may_fire_again()
    }

    pub fn fire_instance_id(&self) -> Option<&str> {
        self.trigger.fire_instance_id.as_deref()
    }

    /// Independent copy of the schedule payload.
    pub fn trigger_clone(&self) -> TriggerDetail {
        self.trigger.clone()
    }

    /// Change state, recording the mutating node, and re-publish.
    pub fn set_state(
        &mut self,
        state: TriggerState,
        owner_id: &str,
        map: &SharedMap<Key, TriggerRecord>,
    ) -> Result<(), StorageError> {
        self.state = state;
        self.last_owner_id = Some(owner_id.to_string());
        map.put(&self.key, self)
    }

    /// Advance the schedule past a fire and re-publish.
    pub fn triggered(&mut self, map: &SharedMap<Key, TriggerRecord>) -> Result<(), StorageError> {
        self.trigger.triggered();
        map.put(&self.key, self)
    }

    /// Repair a missed fire time and re-publish.
    pub fn update_after_misfire(
        &mut self,
        now: u64,
        map: &SharedMap<Key, TriggerRecord>,
    ) -> Result<(), StorageError> {
        self.trigger.update_after_misfire(now);
        map.put(&self.key, self)
    }

    /// Stamp a claimed fire and re-publish.
    pub fn set_fire_instance_id(
        &mut self,
        id: String,
        map: &SharedMap<Key, TriggerRecord>,
    ) -> Result<(), StorageError> {
        self.trigger.fire_instance_id = Some(id);
        map.put(&self.key, self)
    }
}

impl PartialEq for TriggerRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TriggerRecord {}

impl Hash for TriggerRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Ephemeral record of a claimed fire, keyed by fire instance id. Written
/// at acquisition, stamped at fire, removed at completion or by the
/// recovery sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredTriggerRecord {
    pub fire_instance_id: String,
    pub trigger_key: Key,
    pub job_key: Key,
    /// Node holding the claim.
    pub node_id: String,
    pub acquired_at: u64,
    /// Set once the trigger actually fired; a claim that dies before this
    /// is stamped only needs to be released, not recovered.
    pub fired_at: Option<u64>,
    pub job_requests_recovery: bool,
}

/// Node liveness lease, refreshed by the coordination task. An expired
/// lease is how the rest of the cluster observes a node death.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLease {
    pub node_id: String,
    pub expires_at: u64,
}

impl NodeLease {
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterBackend, MemoryBackend};
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_mutating_setters_republish_the_snapshot() {
        let backend = MemoryBackend::new();
        let map: SharedMap<Key, JobRecord> = SharedMap::new(backend.map("jobs"));

        let key = Key::of("j");
        let mut record = JobRecord::new(JobDetail::new(key.clone(), "noop"));
        map.put(&key, &record).unwrap();

        let mut data = Map::new();
        data.insert("batch".to_string(), json!(42));
        record.set_data(data, &map).unwrap();

        // the stored snapshot reflects the setter without a manual put
        let stored = map.get(&key).unwrap().unwrap();
        assert_eq!(stored.job_detail_clone().data.get("batch"), Some(&json!(42)));
    }

    #[test]
    fn test_set_state_records_the_mutating_node() {
        let backend = MemoryBackend::new();
        let map: SharedMap<Key, TriggerRecord> = SharedMap::new(backend.map("triggers"));

        let trigger = TriggerDetail::new(Key::of("t"), Key::of("j"), 1_000);
        let mut record = TriggerRecord::new(trigger, false);
        assert_eq!(record.last_owner_id(), None);

        record.set_state(TriggerState::Acquired, "node-a", &map).unwrap();

        let stored = map.get(&Key::of("t")).unwrap().unwrap();
        assert_eq!(stored.state(), TriggerState::Acquired);
        assert_eq!(stored.last_owner_id(), Some("node-a"));
    }

    #[test]
    fn test_record_identity_ignores_mutable_state() {
        let t1 = TriggerDetail::new(Key::of("t"), Key::of("j"), 1_000);
        let mut t2 = TriggerDetail::new(Key::of("t"), Key::of("j"), 9_999);
        t2.priority = 1;

        let a = TriggerRecord::new(t1, false);
        let b = TriggerRecord::new(t2, true);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        assert_eq!(set.len(), 1);
    }
}
