//! Namespaced shared-collection family for one store.
//!
//! Collection names are `{prefix}-{store}-{collection}`, so multiple
//! stores can share one backing cluster without collision. Per-group
//! membership sets are materialized lazily and cached locally.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cluster::{ClusterBackend, ClusterLock, SharedMap, SharedSet};
use crate::config::StoreConfig;
use crate::model::Key;

use super::time_index::TimeTriggerIndex;
use super::wrappers::{FiredTriggerRecord, JobRecord, NodeLease, TriggerRecord};

const JOBS_MAP: &str = "jobs";
const TRIGGERS_MAP: &str = "triggers";
const FIRED_TRIGGERS_MAP: &str = "fired-triggers";
const NODE_LEASES_MAP: &str = "node-leases";
const ALL_JOB_GROUPS_SET: &str = "job-group-names";
const ALL_TRIGGER_GROUPS_SET: &str = "trigger-group-names";
const PAUSED_JOB_GROUPS_SET: &str = "paused-job-groups";
const PAUSED_TRIGGER_GROUPS_SET: &str = "paused-trigger-groups";
const BLOCKED_JOBS_SET: &str = "blocked-jobs";
const JOB_GROUP_PREFIX: &str = "grp-jobs-";
const TRIGGER_GROUP_PREFIX: &str = "grp-triggers-";
const TIME_INDEX_SET: &str = "time-index";
const STORE_LOCK: &str = "lock";

pub(crate) struct CollectionsHolder {
    backend: Arc<dyn ClusterBackend>,
    config: StoreConfig,
    pub(crate) jobs: SharedMap<Key, JobRecord>,
    pub(crate) triggers: SharedMap<Key, TriggerRecord>,
    pub(crate) fired_triggers: SharedMap<String, FiredTriggerRecord>,
    pub(crate) node_leases: SharedMap<String, NodeLease>,
    pub(crate) all_job_groups: SharedSet<String>,
    pub(crate) all_trigger_groups: SharedSet<String>,
    pub(crate) paused_job_groups: SharedSet<String>,
    pub(crate) paused_trigger_groups: SharedSet<String>,
    pub(crate) blocked_jobs: SharedSet<Key>,
    pub(crate) time_index: TimeTriggerIndex,
    lock: Arc<dyn ClusterLock>,
    job_group_sets: DashMap<String, SharedSet<String>>,
    trigger_group_sets: DashMap<String, SharedSet<String>>,
}

impl CollectionsHolder {
    pub(crate) fn new(backend: Arc<dyn ClusterBackend>, config: &StoreConfig) -> Self {
        let name = |coll: &str| config.collection(coll);
        Self {
            jobs: SharedMap::new(backend.map(&name(JOBS_MAP))),
            triggers: SharedMap::new(backend.map(&name(TRIGGERS_MAP))),
            fired_triggers: SharedMap::new(backend.map(&name(FIRED_TRIGGERS_MAP))),
            node_leases: SharedMap::new(backend.map(&name(NODE_LEASES_MAP))),
            all_job_groups: SharedSet::new(backend.set(&name(ALL_JOB_GROUPS_SET))),
            all_trigger_groups: SharedSet::new(backend.set(&name(ALL_TRIGGER_GROUPS_SET))),
            paused_job_groups: SharedSet::new(backend.set(&name(PAUSED_JOB_GROUPS_SET))),
            paused_trigger_groups: SharedSet::new(backend.set(&name(PAUSED_TRIGGER_GROUPS_SET))),
            blocked_jobs: SharedSet::new(backend.set(&name(BLOCKED_JOBS_SET))),
            time_index: TimeTriggerIndex::new(backend.sorted_set(&name(TIME_INDEX_SET))),
            lock: backend.lock(&name(STORE_LOCK)),
            job_group_sets: DashMap::new(),
            trigger_group_sets: DashMap::new(),
            backend,
            config: config.clone(),
        }
    }

    pub(crate) fn lock(&self) -> &dyn ClusterLock {
        &*self.lock
    }

    /// Membership set for one job group.
    pub(crate) fn job_group_set(&self, group: &str) -> SharedSet<String> {
        self.job_group_sets
            .entry(group.to_string())
            .or_insert_with(|| {
                let name = self
                    .config
                    .collection(&format!("{}{}", JOB_GROUP_PREFIX, group));
                SharedSet::new(self.backend.set(&name))
            })
            .clone()
    }

    /// Membership set for one trigger group.
    pub(crate) fn trigger_group_set(&self, group: &str) -> SharedSet<String> {
        self.trigger_group_sets
            .entry(group.to_string())
            .or_insert_with(|| {
                let name = self
                    .config
                    .collection(&format!("{}{}", TRIGGER_GROUP_PREFIX, group));
                SharedSet::new(self.backend.set(&name))
            })
            .clone()
    }
}
