//! Job and trigger registration, removal, and read queries.

use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::model::{JobDetail, Key, TriggerDetail};

use super::time_index::TimeTriggerEntry;
use super::wrappers::{JobRecord, TriggerRecord, TriggerState};
use super::ClusteredJobStore;

impl ClusteredJobStore {
    /// Register a job, or replace its snapshot wholesale when `replace`.
    pub fn store_job(&self, job: JobDetail, replace: bool) -> Result<()> {
        self.with_lock(|| self.store_job_locked(job, replace))
    }

    pub(crate) fn store_job_locked(&self, job: JobDetail, replace: bool) -> Result<()> {
        let h = &self.holder;
        if !replace && h.jobs.contains(&job.key)? {
            return Err(SchedulerError::DuplicateKey(format!(
                "job {} already exists",
                job.key
            )));
        }
        let key = job.key.clone();
        h.jobs.put(&key, &JobRecord::new(job))?;
        h.job_group_set(&key.group).add(&key.name)?;
        h.all_job_groups.add(&key.group)?;
        debug!(job = %key, "Stored job");
        Ok(())
    }

    /// Register a trigger for an existing job, or replace it wholesale.
    ///
    /// The concurrency flag is copied from the job here, once. A trigger
    /// registered into a paused group is paused immediately, even when the
    /// group was paused before it had any members.
    pub fn store_trigger(&self, trigger: TriggerDetail, replace: bool) -> Result<()> {
        self.with_lock(|| self.store_trigger_locked(trigger, replace))
    }

    pub(crate) fn store_trigger_locked(&self, trigger: TriggerDetail, replace: bool) -> Result<()> {
        let h = &self.holder;
        if let Some(old) = h.triggers.get(&trigger.key)? {
            if !replace {
                return Err(SchedulerError::DuplicateKey(format!(
                    "trigger {} already exists",
                    trigger.key
                )));
            }
            // drop the superseded index entry before the snapshot changes
            if old.state() == TriggerState::Waiting {
                if let Some(ft) = old.next_fire_time() {
                    h.time_index
                        .remove(&TimeTriggerEntry::new(ft, old.priority(), old.key().clone()))?;
                }
            }
        }
        let Some(job) = h.jobs.get(&trigger.job_key)? else {
            return Err(SchedulerError::InconsistentState(format!(
                "trigger {} references missing job {}",
                trigger.key, trigger.job_key
            )));
        };

        let key = trigger.key.clone();
        let job_group = trigger.job_key.group.clone();
        let mut record = TriggerRecord::new(trigger, job.concurrent_execution_disallowed());

        h.trigger_group_set(&key.group).add(&key.name)?;
        h.all_trigger_groups.add(&key.group)?;

        let paused = h.paused_trigger_groups.contains(&key.group)?
            || h.paused_job_groups.contains(&job_group)?;
        let blocked = h.blocked_jobs.contains(record.job_key())?;
        let state = match (paused, blocked) {
            (true, true) => TriggerState::PausedBlocked,
            (true, false) => TriggerState::Paused,
            (false, true) => TriggerState::Blocked,
            (false, false) => TriggerState::Waiting,
        };
        record.set_state(state, &self.node_id, &h.triggers)?;

        if state == TriggerState::Waiting {
            if let Some(ft) = record.next_fire_time() {
                h.time_index
                    .insert(&TimeTriggerEntry::new(ft, record.priority(), key.clone()))?;
            }
        }
        debug!(trigger = %key, state = ?state, "Stored trigger");
        Ok(())
    }

    /// Remove a job and every trigger referencing it.
    pub fn remove_job(&self, key: &Key) -> Result<bool> {
        self.with_lock(|| self.remove_job_locked(key))
    }

    pub(crate) fn remove_job_locked(&self, key: &Key) -> Result<bool> {
        let h = &self.holder;
        for record in self.triggers_for_job_locked(key)? {
            self.remove_trigger_locked(record.key(), false)?;
        }
        let removed = h.jobs.remove(key)?.is_some();
        if removed {
            let group_set = h.job_group_set(&key.group);
            group_set.remove(&key.name)?;
            if group_set.is_empty()? && !h.paused_job_groups.contains(&key.group)? {
                h.all_job_groups.remove(&key.group)?;
            }
            debug!(job = %key, "Removed job");
        }
        Ok(removed)
    }

    /// Remove a trigger. A non-durable job left with no triggers is
    /// removed as well; the deletion policy is job-level.
    pub fn remove_trigger(&self, key: &Key) -> Result<bool> {
        self.with_lock(|| self.remove_trigger_locked(key, true))
    }

    pub(crate) fn remove_trigger_locked(&self, key: &Key, delete_orphaned_job: bool) -> Result<bool> {
        let h = &self.holder;
        let Some(record) = h.triggers.remove(key)? else {
            return Ok(false);
        };
        if record.state() == TriggerState::Waiting {
            if let Some(ft) = record.next_fire_time() {
                h.time_index
                    .remove(&TimeTriggerEntry::new(ft, record.priority(), key.clone()))?;
            }
        }
        let group_set = h.trigger_group_set(&key.group);
        group_set.remove(&key.name)?;
        if group_set.is_empty()? && !h.paused_trigger_groups.contains(&key.group)? {
            h.all_trigger_groups.remove(&key.group)?;
        }

        if delete_orphaned_job {
            if let Some(job) = h.jobs.get(record.job_key())? {
                if !job.durable() && self.triggers_for_job_locked(record.job_key())?.is_empty() {
                    self.remove_job_locked(record.job_key())?;
                }
            }
        }
        debug!(trigger = %key, "Removed trigger");
        Ok(true)
    }

    /// All trigger records referencing `job_key`. Full scan of the trigger
    /// map; never used on the acquisition path.
    pub(crate) fn triggers_for_job_locked(&self, job_key: &Key) -> Result<Vec<TriggerRecord>> {
        let h = &self.holder;
        let mut out = Vec::new();
        for key in h.triggers.keys()? {
            if let Some(record) = h.triggers.get(&key)? {
                if record.job_key() == job_key {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// Independent copy of a stored job.
    pub fn retrieve_job(&self, key: &Key) -> Result<Option<JobDetail>> {
        Ok(self.holder.jobs.get(key)?.map(|r| r.job_detail_clone()))
    }

    /// Independent copy of a stored trigger's schedule payload.
    pub fn retrieve_trigger(&self, key: &Key) -> Result<Option<TriggerDetail>> {
        Ok(self.holder.triggers.get(key)?.map(|r| r.trigger_clone()))
    }

    pub fn check_job_exists(&self, key: &Key) -> Result<bool> {
        Ok(self.holder.jobs.contains(key)?)
    }

    pub fn check_trigger_exists(&self, key: &Key) -> Result<bool> {
        Ok(self.holder.triggers.contains(key)?)
    }

    pub fn get_trigger_state(&self, key: &Key) -> Result<Option<TriggerState>> {
        Ok(self.holder.triggers.get(key)?.map(|r| r.state()))
    }

    /// Schedule payloads of every trigger referencing `job_key`.
    pub fn get_triggers_for_job(&self, job_key: &Key) -> Result<Vec<TriggerDetail>> {
        self.with_lock(|| {
            Ok(self
                .triggers_for_job_locked(job_key)?
                .iter()
                .map(|r| r.trigger_clone())
                .collect())
        })
    }

    pub fn get_job_group_names(&self) -> Result<Vec<String>> {
        Ok(self.holder.all_job_groups.members()?)
    }

    pub fn get_trigger_group_names(&self) -> Result<Vec<String>> {
        Ok(self.holder.all_trigger_groups.members()?)
    }

    /// Job keys registered in one group.
    pub fn get_job_keys(&self, group: &str) -> Result<Vec<Key>> {
        Ok(self
            .holder
            .job_group_set(group)
            .members()?
            .into_iter()
            .map(|name| Key::new(name, group))
            .collect())
    }

    /// Trigger keys registered in one group.
    pub fn get_trigger_keys(&self, group: &str) -> Result<Vec<Key>> {
        Ok(self
            .holder
            .trigger_group_set(group)
            .members()?
            .into_iter()
            .map(|name| Key::new(name, group))
            .collect())
    }
}
