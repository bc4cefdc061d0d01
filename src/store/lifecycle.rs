//! Fire and completion transitions.

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{JobDetail, Key, TriggerDetail};

use super::time_index::TimeTriggerEntry;
use super::wrappers::{TriggerRecord, TriggerState};
use super::ClusteredJobStore;

/// Directive a job execution hands back when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedInstruction {
    NoInstruction,
    SetTriggerComplete,
    DeleteTrigger,
    SetTriggerError,
    SetAllJobTriggersComplete,
    SetAllJobTriggersError,
}

/// One fired trigger, bundled with its job for the executor.
#[derive(Debug, Clone)]
pub struct TriggerFiredResult {
    pub trigger: TriggerDetail,
    pub job: JobDetail,
    /// The scheduled time this fire satisfied.
    pub fire_time: u64,
}

impl ClusteredJobStore {
    /// Report that acquired triggers are now firing. Each schedule is
    /// advanced and the post-fire state resolved; triggers released or
    /// re-claimed since acquisition are skipped silently.
    pub fn triggers_fired(
        &self,
        triggers: &[TriggerDetail],
        now: u64,
    ) -> Result<Vec<TriggerFiredResult>> {
        self.with_lock(|| {
            let mut results = Vec::with_capacity(triggers.len());
            for trigger in triggers {
                if let Some(result) = self.trigger_fired_locked(trigger, now)? {
                    results.push(result);
                }
            }
            Ok(results)
        })
    }

    fn trigger_fired_locked(
        &self,
        trigger: &TriggerDetail,
        now: u64,
    ) -> Result<Option<TriggerFiredResult>> {
        let h = &self.holder;
        let Some(mut record) = h.triggers.get(&trigger.key)? else {
            return Ok(None);
        };
        if record.state() != TriggerState::Acquired {
            return Ok(None);
        }
        let Some(job) = h.jobs.get(record.job_key())? else {
            warn!(
                trigger = %trigger.key,
                job = %record.job_key(),
                "Trigger references missing job; quarantining"
            );
            record.set_state(TriggerState::Error, &self.node_id, &h.triggers)?;
            return Ok(None);
        };

        let fire_time = record.next_fire_time().unwrap_or(now);
        record.triggered(&h.triggers)?;

        // stamp the claim as actually fired
        let fire_id = record.fire_instance_id().map(str::to_string);
        if let Some(id) = &fire_id {
            if let Some(mut fired) = h.fired_triggers.get(id)? {
                fired.fired_at = Some(now);
                h.fired_triggers.put(id, &fired)?;
            }
        }

        let result = TriggerFiredResult {
            trigger: record.trigger_clone(),
            job: job.job_detail_clone(),
            fire_time,
        };

        if job.concurrent_execution_disallowed() {
            h.blocked_jobs.add(record.job_key())?;
            let job_key = record.job_key().clone();
            self.block_siblings_locked(&job_key, &trigger.key)?;
            // the firing trigger itself waits out the execution
            if record.may_fire_again() {
                record.set_state(TriggerState::Blocked, &self.node_id, &h.triggers)?;
            } else {
                self.complete_trigger_locked(record)?;
            }
        } else {
            match record.next_fire_time() {
                Some(ft) => {
                    record.set_state(TriggerState::Waiting, &self.node_id, &h.triggers)?;
                    h.time_index.insert(&TimeTriggerEntry::new(
                        ft,
                        record.priority(),
                        trigger.key.clone(),
                    ))?;
                }
                None => self.complete_trigger_locked(record)?,
            }
        }

        Ok(Some(result))
    }

    /// Notification that a job execution finished. Clears the concurrency
    /// gate, drops the claim record, and applies the completion directive.
    pub fn triggered_job_complete(
        &self,
        trigger: &TriggerDetail,
        job_key: &Key,
        instruction: CompletedInstruction,
    ) -> Result<()> {
        self.with_lock(|| self.job_complete_locked(trigger, job_key, instruction))
    }

    fn job_complete_locked(
        &self,
        trigger: &TriggerDetail,
        job_key: &Key,
        instruction: CompletedInstruction,
    ) -> Result<()> {
        let h = &self.holder;
        if let Some(id) = trigger.fire_instance_id.as_deref() {
            h.fired_triggers.remove(&id.to_string())?;
        }

        if let Some(job) = h.jobs.get(job_key)? {
            if job.concurrent_execution_disallowed() {
                h.blocked_jobs.remove(job_key)?;
                self.unblock_siblings_locked(job_key)?;
            }
        } else {
            // job deleted while executing; the gate must not outlive it
            h.blocked_jobs.remove(job_key)?;
        }

        match instruction {
            CompletedInstruction::NoInstruction => {}
            CompletedInstruction::SetTriggerComplete => {
                if let Some(record) = h.triggers.get(&trigger.key)? {
                    self.complete_trigger_locked(record)?;
                }
            }
            CompletedInstruction::DeleteTrigger => {
                self.remove_trigger_locked(&trigger.key, true)?;
            }
            CompletedInstruction::SetTriggerError => {
                if let Some(record) = h.triggers.get(&trigger.key)? {
                    self.error_trigger_locked(record)?;
                }
            }
            CompletedInstruction::SetAllJobTriggersComplete => {
                for record in self.triggers_for_job_locked(job_key)? {
                    self.complete_trigger_locked(record)?;
                }
            }
            CompletedInstruction::SetAllJobTriggersError => {
                for record in self.triggers_for_job_locked(job_key)? {
                    self.error_trigger_locked(record)?;
                }
            }
        }
        Ok(())
    }

    /// While a disallowed job runs, its other triggers must not fire.
    fn block_siblings_locked(&self, job_key: &Key, firing: &Key) -> Result<()> {
        let h = &self.holder;
        for mut sibling in self.triggers_for_job_locked(job_key)? {
            if sibling.key() == firing {
                continue;
            }
            match sibling.state() {
                TriggerState::Waiting => {
                    if let Some(ft) = sibling.next_fire_time() {
                        h.time_index.remove(&TimeTriggerEntry::new(
                            ft,
                            sibling.priority(),
                            sibling.key().clone(),
                        ))?;
                    }
                    sibling.set_state(TriggerState::Blocked, &self.node_id, &h.triggers)?;
                }
                TriggerState::Paused => {
                    sibling.set_state(TriggerState::PausedBlocked, &self.node_id, &h.triggers)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Inverse of [`Self::block_siblings_locked`], run at job completion.
    pub(crate) fn unblock_siblings_locked(&self, job_key: &Key) -> Result<()> {
        let h = &self.holder;
        for mut record in self.triggers_for_job_locked(job_key)? {
            match record.state() {
                TriggerState::Blocked => {
                    record.set_state(TriggerState::Waiting, &self.node_id, &h.triggers)?;
                    if let Some(ft) = record.next_fire_time() {
                        h.time_index.insert(&TimeTriggerEntry::new(
                            ft,
                            record.priority(),
                            record.key().clone(),
                        ))?;
                    }
                }
                TriggerState::PausedBlocked => {
                    record.set_state(TriggerState::Paused, &self.node_id, &h.triggers)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Terminal transition; removes the record and applies the job-level
    /// deletion policy.
    pub(crate) fn complete_trigger_locked(&self, mut record: TriggerRecord) -> Result<()> {
        let h = &self.holder;
        if record.state() == TriggerState::Waiting {
            if let Some(ft) = record.next_fire_time() {
                h.time_index.remove(&TimeTriggerEntry::new(
                    ft,
                    record.priority(),
                    record.key().clone(),
                ))?;
            }
        }
        record.set_state(TriggerState::Complete, &self.node_id, &h.triggers)?;
        debug!(trigger = %record.key(), "Trigger complete");
        self.remove_trigger_locked(record.key(), true)?;
        Ok(())
    }

    /// Quarantine a trigger, keeping the record for inspection.
    fn error_trigger_locked(&self, mut record: TriggerRecord) -> Result<()> {
        let h = &self.holder;
        if record.state() == TriggerState::Waiting {
            if let Some(ft) = record.next_fire_time() {
                h.time_index.remove(&TimeTriggerEntry::new(
                    ft,
                    record.priority(),
                    record.key().clone(),
                ))?;
            }
        }
        warn!(trigger = %record.key(), "Trigger set to error state");
        record.set_state(TriggerState::Error, &self.node_id, &h.triggers)?;
        Ok(())
    }
}
