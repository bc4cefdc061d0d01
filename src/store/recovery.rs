//! Node liveness and orphaned-claim recovery.
//!
//! Liveness is a lease with expiry, not process-death detection: each node
//! refreshes its lease on the coordination task, and any surviving node's
//! sweep treats an expired lease as a death. The sweep only touches
//! records already visible in the shared store, so running it redundantly
//! from several nodes is safe.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Result, SchedulerError};
use crate::model::{now_ms, Key, TriggerDetail};

use super::wrappers::{FiredTriggerRecord, NodeLease};
use super::ClusteredJobStore;

/// Group holding one-shot recovery triggers.
pub const RECOVERY_GROUP: &str = "RECOVERING_JOBS";

impl ClusteredJobStore {
    /// Refresh this node's liveness lease.
    pub fn record_heartbeat(&self, now: u64) -> Result<()> {
        let ttl = self.config.node_lease_ttl.as_millis() as u64;
        self.holder.node_leases.put(
            &self.node_id,
            &NodeLease {
                node_id: self.node_id.clone(),
                expires_at: now + ttl,
            },
        )?;
        Ok(())
    }

    /// Sweep fired-trigger claims. Claims owned by dead nodes are
    /// recovered; claims held unfired past the claim timeout are released
    /// so a stuck node cannot starve the cluster. Idempotent.
    ///
    /// Returns the number of claims repaired. Per-record failures are
    /// logged and skipped so one corrupt record cannot block the rest.
    pub fn recover_fired_triggers(&self, now: u64) -> Result<usize> {
        self.with_lock(|| self.recover_locked(now))
    }

    fn recover_locked(&self, now: u64) -> Result<usize> {
        let h = &self.holder;
        let claim_timeout = self.config.claim_timeout.as_millis() as u64;
        let mut repaired = 0;

        for fire_id in h.fired_triggers.keys()? {
            let Some(fired) = h.fired_triggers.get(&fire_id)? else {
                continue;
            };

            let owner_live = fired.node_id == self.node_id
                || match h.node_leases.get(&fired.node_id)? {
                    Some(lease) => !lease.is_expired(now),
                    None => false,
                };

            if !owner_live {
                match self.recover_claim_locked(&fired, now) {
                    Ok(()) => {
                        repaired += 1;
                    }
                    Err(e) => {
                        warn!(
                            fire_instance = %fire_id,
                            error = %e,
                            "Skipping unrecoverable claim"
                        );
                    }
                }
                continue;
            }

            // a live owner sitting on an unfired claim for too long
            if fired.fired_at.is_none() && now.saturating_sub(fired.acquired_at) > claim_timeout {
                warn!(
                    trigger = %fired.trigger_key,
                    node = %fired.node_id,
                    "Releasing expired claim"
                );
                self.release_acquired_locked(&fired.trigger_key, Some(fired.fire_instance_id.as_str()))?;
                h.fired_triggers.remove(&fired.fire_instance_id)?;
                repaired += 1;
            }
        }

        Ok(repaired)
    }

    fn recover_claim_locked(&self, fired: &FiredTriggerRecord, now: u64) -> Result<()> {
        let h = &self.holder;

        if fired.fired_at.is_some() {
            // the execution died with its node; emulate its completion so
            // the concurrency gate cannot leak
            h.blocked_jobs.remove(&fired.job_key)?;
            self.unblock_siblings_locked(&fired.job_key)?;

            if fired.job_requests_recovery {
                let key = Key::new(format!("recover-{}", fired.fire_instance_id), RECOVERY_GROUP);
                let mut trigger = TriggerDetail::new(key, fired.job_key.clone(), now);
                trigger.description = Some(format!("recovery for {}", fired.trigger_key));
                self.store_trigger_locked(trigger, true)?;
                info!(job = %fired.job_key, "Created recovery trigger");
            }
        } else {
            // claimed but never fired; nothing was lost
            self.release_acquired_locked(&fired.trigger_key, Some(fired.fire_instance_id.as_str()))?;
        }

        h.fired_triggers.remove(&fired.fire_instance_id)?;
        info!(
            trigger = %fired.trigger_key,
            node = %fired.node_id,
            "Recovered orphaned claim"
        );
        Ok(())
    }

    /// Spawn the per-node coordination task: heartbeat plus recovery sweep
    /// at the configured cadence. Abort the returned handle on shutdown.
    pub fn start_coordination(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.config.heartbeat_interval);
            loop {
                interval.tick().await;
                let now = now_ms();
                if let Err(e) = store.record_heartbeat(now) {
                    warn!(error = %e, "Heartbeat failed");
                    continue;
                }
                match store.recover_fired_triggers(now) {
                    Ok(0) => {}
                    Ok(n) => info!(count = n, "Recovery sweep repaired claims"),
                    // lock contention here is ordinary; retry next cycle
                    Err(SchedulerError::LockUnavailable(_)) => {}
                    Err(e) => warn!(error = %e, "Recovery sweep failed"),
                }
            }
        })
    }
}
