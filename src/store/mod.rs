//! Clustered trigger/job store.
//!
//! ## Module organization
//!
//! - `holder.rs` - namespaced shared-collection family
//! - `wrappers.rs` - entity records with re-publish setters
//! - `time_index.rs` - time-ordered acquisition index
//! - `registry.rs` - job/trigger registration and group membership
//! - `acquire.rs` - acquisition, release, misfire routing
//! - `lifecycle.rs` - fire and completion transitions
//! - `pause.rs` - pause/resume for triggers and groups
//! - `recovery.rs` - node leases and orphaned-claim recovery
//!
//! Every index, group-set, and state mutation for a transition happens
//! inside one section of the store-wide cluster lock; coarse by intent,
//! since index restructuring is fast relative to job execution and
//! no-double-fire matters more than parallel acquisition.

mod holder;
mod time_index;
mod wrappers;

mod acquire;
mod lifecycle;
mod pause;
mod recovery;
mod registry;

#[cfg(test)]
mod tests;

pub use lifecycle::{CompletedInstruction, TriggerFiredResult};
pub use recovery::RECOVERY_GROUP;
pub use time_index::{TimeTriggerEntry, TimeTriggerIndex};
pub use wrappers::{FiredTriggerRecord, JobRecord, NodeLease, TriggerRecord, TriggerState};

use std::sync::Arc;

use tracing::info;

use crate::cluster::{ClusterBackend, LockGuard};
use crate::config::StoreConfig;
use crate::error::{Result, SchedulerError};

use holder::CollectionsHolder;

/// Shared-store scheduling engine: owns the trigger/job maps, group sets,
/// blocked-job set, and the time index, and runs every state transition
/// under the cluster lock.
pub struct ClusteredJobStore {
    pub(crate) config: StoreConfig,
    pub(crate) node_id: String,
    pub(crate) holder: CollectionsHolder,
}

impl ClusteredJobStore {
    pub fn new(backend: Arc<dyn ClusterBackend>, config: StoreConfig) -> Self {
        let node_id = config.node_id();
        let holder = CollectionsHolder::new(backend, &config);
        info!(store = %config.store_name, node_id = %node_id, "Clustered job store initialized");
        Self {
            config,
            node_id,
            holder,
        }
    }

    #[inline]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Run `f` inside the store-wide lock section.
    pub(crate) fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = LockGuard::acquire(self.holder.lock(), self.config.lock_timeout)
            .map_err(SchedulerError::from)?;
        f()
    }
}
