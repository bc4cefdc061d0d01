//! Trigger acquisition.
//!
//! The scan-and-claim sequence is the sole race-sensitive operation in the
//! engine and runs entirely inside the store lock: nodes race to call it,
//! the lock serializes them, and the index hands each caller the next due
//! work in order.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Key, TriggerDetail};

use super::time_index::TimeTriggerEntry;
use super::wrappers::{FiredTriggerRecord, TriggerState};
use super::ClusteredJobStore;

/// Index entries fetched per scan step.
const SCAN_BATCH: usize = 32;

impl ClusteredJobStore {
    /// Claim up to `max_count` triggers due within `now + time_window` ms.
    ///
    /// Returned triggers are in fire order (time ascending, priority
    /// descending on ties) and carry a fresh fire instance id. Triggers
    /// found misfired are repaired first; triggers in paused groups or
    /// gated by a concurrency-disallowed job flip to PAUSED/BLOCKED and
    /// are skipped for this round.
    pub fn acquire_next_triggers(
        &self,
        now: u64,
        max_count: usize,
        time_window: u64,
    ) -> Result<Vec<TriggerDetail>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        self.with_lock(|| self.acquire_locked(now, max_count, time_window))
    }

    fn acquire_locked(
        &self,
        now: u64,
        max_count: usize,
        time_window: u64,
    ) -> Result<Vec<TriggerDetail>> {
        let h = &self.holder;
        let misfire_threshold = self.config.misfire_threshold.as_millis() as u64;
        let deadline = now + time_window;
        let mut acquired = Vec::new();
        let mut cursor: Vec<u8> = Vec::new();

        'scan: loop {
            let batch = h.time_index.scan_from(&cursor, SCAN_BATCH)?;
            if batch.is_empty() {
                break;
            }
            for (raw, entry) in batch {
                cursor = next_cursor(&raw);
                if entry.fire_time > deadline {
                    break 'scan;
                }

                let Some(mut record) = h.triggers.get(&entry.key)? else {
                    warn!(trigger = %entry.key, "Dropping stale time index entry");
                    h.time_index.remove_raw(&raw)?;
                    continue;
                };
                if record.state() != TriggerState::Waiting {
                    // index upkeep lagged a transition; repair and move on
                    h.time_index.remove_raw(&raw)?;
                    continue;
                }

                // misfire repair happens before the trigger can be claimed
                if entry.fire_time + misfire_threshold < now {
                    record.update_after_misfire(now, &h.triggers)?;
                    match record.next_fire_time() {
                        None => {
                            debug!(trigger = %entry.key, "Trigger exhausted by misfire");
                            h.time_index.remove_raw(&raw)?;
                            self.complete_trigger_locked(record)?;
                            continue;
                        }
                        Some(ft) if ft != entry.fire_time => {
                            // re-enters the scan at its repaired position
                            h.time_index.remove_raw(&raw)?;
                            h.time_index.insert(&TimeTriggerEntry::new(
                                ft,
                                record.priority(),
                                entry.key.clone(),
                            ))?;
                            continue;
                        }
                        // policy left the fire time in place; claim the
                        // late fire as-is
                        Some(_) => {}
                    }
                }

                if h.paused_trigger_groups.contains(&entry.key.group)?
                    || h.paused_job_groups.contains(&record.job_key().group)?
                {
                    h.time_index.remove_raw(&raw)?;
                    record.set_state(TriggerState::Paused, &self.node_id, &h.triggers)?;
                    continue;
                }

                if record.job_disallows_concurrence()
                    && h.blocked_jobs.contains(record.job_key())?
                {
                    h.time_index.remove_raw(&raw)?;
                    record.set_state(TriggerState::Blocked, &self.node_id, &h.triggers)?;
                    continue;
                }

                let Some(job) = h.jobs.get(record.job_key())? else {
                    warn!(
                        trigger = %entry.key,
                        job = %record.job_key(),
                        "Trigger references missing job; quarantining"
                    );
                    h.time_index.remove_raw(&raw)?;
                    record.set_state(TriggerState::Error, &self.node_id, &h.triggers)?;
                    continue;
                };

                h.time_index.remove_raw(&raw)?;
                record.set_state(TriggerState::Acquired, &self.node_id, &h.triggers)?;
                if record.job_disallows_concurrence() {
                    // gate the job for the whole claim, not just the
                    // execution; later entries for it flip to BLOCKED
                    h.blocked_jobs.add(record.job_key())?;
                }
                let fire_id = Uuid::new_v4().to_string();
                record.set_fire_instance_id(fire_id.clone(), &h.triggers)?;
                h.fired_triggers.put(
                    &fire_id,
                    &FiredTriggerRecord {
                        fire_instance_id: fire_id.clone(),
                        trigger_key: entry.key.clone(),
                        job_key: record.job_key().clone(),
                        node_id: self.node_id.clone(),
                        acquired_at: now,
                        fired_at: None,
                        job_requests_recovery: job.requests_recovery(),
                    },
                )?;
                acquired.push(record.trigger_clone());
                if acquired.len() >= max_count {
                    break 'scan;
                }
            }
        }

        if !acquired.is_empty() {
            debug!(count = acquired.len(), "Acquired triggers");
        }
        Ok(acquired)
    }

    /// Return an acquired-but-unfired trigger to the waiting set, e.g. on
    /// shutdown before firing. Calling it again once the trigger is no
    /// longer ACQUIRED is a no-op.
    pub fn release_acquired_trigger(&self, trigger: &TriggerDetail) -> Result<()> {
        self.with_lock(|| {
            self.release_acquired_locked(&trigger.key, trigger.fire_instance_id.as_deref())
        })
    }

    pub(crate) fn release_acquired_locked(
        &self,
        key: &Key,
        fire_instance_id: Option<&str>,
    ) -> Result<()> {
        let h = &self.holder;
        let Some(mut record) = h.triggers.get(key)? else {
            return Ok(());
        };
        if record.state() != TriggerState::Acquired {
            return Ok(());
        }
        let claim_id = fire_instance_id
            .map(str::to_string)
            .or_else(|| record.fire_instance_id().map(str::to_string));
        record.set_state(TriggerState::Waiting, &self.node_id, &h.triggers)?;
        if let Some(ft) = record.next_fire_time() {
            h.time_index
                .insert(&TimeTriggerEntry::new(ft, record.priority(), key.clone()))?;
        }
        if record.job_disallows_concurrence() {
            let job_key = record.job_key().clone();
            h.blocked_jobs.remove(&job_key)?;
            self.unblock_siblings_locked(&job_key)?;
        }
        if let Some(id) = claim_id {
            h.fired_triggers.remove(&id)?;
        }
        debug!(trigger = %key, "Released acquired trigger");
        Ok(())
    }
}

/// Smallest byte string strictly greater than `raw`.
fn next_cursor(raw: &[u8]) -> Vec<u8> {
    let mut cursor = raw.to_vec();
    cursor.push(0);
    cursor
}
