//! Pause and resume for triggers and groups.
//!
//! A paused group is registered even when it has no members yet: triggers
//! stored into it later are paused on arrival.

use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::model::{now_ms, Key};

use super::time_index::TimeTriggerEntry;
use super::wrappers::TriggerState;
use super::ClusteredJobStore;

impl ClusteredJobStore {
    /// Suspend a trigger; it leaves the time index until resumed.
    pub fn pause_trigger(&self, key: &Key) -> Result<()> {
        self.with_lock(|| {
            if !self.holder.triggers.contains(key)? {
                return Err(SchedulerError::NotFound(format!("trigger {} not found", key)));
            }
            self.pause_trigger_locked(key)
        })
    }

    pub(crate) fn pause_trigger_locked(&self, key: &Key) -> Result<()> {
        let h = &self.holder;
        let Some(mut record) = h.triggers.get(key)? else {
            return Ok(());
        };
        match record.state() {
            TriggerState::Waiting | TriggerState::Acquired => {
                if record.state() == TriggerState::Waiting {
                    if let Some(ft) = record.next_fire_time() {
                        h.time_index
                            .remove(&TimeTriggerEntry::new(ft, record.priority(), key.clone()))?;
                    }
                }
                record.set_state(TriggerState::Paused, &self.node_id, &h.triggers)?;
            }
            TriggerState::Blocked => {
                record.set_state(TriggerState::PausedBlocked, &self.node_id, &h.triggers)?;
            }
            TriggerState::Complete
            | TriggerState::Paused
            | TriggerState::PausedBlocked
            | TriggerState::Error => {}
        }
        Ok(())
    }

    /// Resume a paused trigger. A fire time that passed while paused is
    /// routed through the misfire policy before the trigger re-enters the
    /// time index.
    pub fn resume_trigger(&self, key: &Key) -> Result<()> {
        self.with_lock(|| {
            if !self.holder.triggers.contains(key)? {
                return Err(SchedulerError::NotFound(format!("trigger {} not found", key)));
            }
            self.resume_trigger_locked(key, now_ms())
        })
    }

    pub(crate) fn resume_trigger_locked(&self, key: &Key, now: u64) -> Result<()> {
        let h = &self.holder;
        let Some(mut record) = h.triggers.get(key)? else {
            return Ok(());
        };
        match record.state() {
            TriggerState::Paused | TriggerState::PausedBlocked => {
                if h.blocked_jobs.contains(record.job_key())? {
                    record.set_state(TriggerState::Blocked, &self.node_id, &h.triggers)?;
                    return Ok(());
                }
                let misfire_threshold = self.config.misfire_threshold.as_millis() as u64;
                if let Some(ft) = record.next_fire_time() {
                    if ft + misfire_threshold < now {
                        record.update_after_misfire(now, &h.triggers)?;
                    }
                }
                match record.next_fire_time() {
                    Some(ft) => {
                        record.set_state(TriggerState::Waiting, &self.node_id, &h.triggers)?;
                        h.time_index
                            .insert(&TimeTriggerEntry::new(ft, record.priority(), key.clone()))?;
                    }
                    None => self.complete_trigger_locked(record)?,
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Pause every trigger in `group`, and the group itself: triggers
    /// registered into it later are paused immediately.
    pub fn pause_trigger_group(&self, group: &str) -> Result<()> {
        self.with_lock(|| {
            let h = &self.holder;
            h.paused_trigger_groups.add(&group.to_string())?;
            h.all_trigger_groups.add(&group.to_string())?;
            for name in h.trigger_group_set(group).members()? {
                self.pause_trigger_locked(&Key::new(name, group))?;
            }
            debug!(group = %group, "Paused trigger group");
            Ok(())
        })
    }

    /// Resume every trigger in `group` and lift the group's pause mark.
    pub fn resume_trigger_group(&self, group: &str) -> Result<()> {
        self.with_lock(|| {
            let h = &self.holder;
            h.paused_trigger_groups.remove(&group.to_string())?;
            let members = h.trigger_group_set(group).members()?;
            if members.is_empty() {
                // the group was only listed because of the pause mark
                h.all_trigger_groups.remove(&group.to_string())?;
            }
            let now = now_ms();
            for name in members {
                self.resume_trigger_locked(&Key::new(name, group), now)?;
            }
            debug!(group = %group, "Resumed trigger group");
            Ok(())
        })
    }

    /// Pause every trigger of every job in `group`, and the group itself.
    pub fn pause_job_group(&self, group: &str) -> Result<()> {
        self.with_lock(|| {
            let h = &self.holder;
            h.paused_job_groups.add(&group.to_string())?;
            h.all_job_groups.add(&group.to_string())?;
            for name in h.job_group_set(group).members()? {
                let job_key = Key::new(name, group);
                for record in self.triggers_for_job_locked(&job_key)? {
                    self.pause_trigger_locked(record.key())?;
                }
            }
            debug!(group = %group, "Paused job group");
            Ok(())
        })
    }

    /// Resume every trigger of every job in `group` and lift the pause.
    pub fn resume_job_group(&self, group: &str) -> Result<()> {
        self.with_lock(|| {
            let h = &self.holder;
            h.paused_job_groups.remove(&group.to_string())?;
            let members = h.job_group_set(group).members()?;
            if members.is_empty() {
                h.all_job_groups.remove(&group.to_string())?;
            }
            let now = now_ms();
            for name in members {
                let job_key = Key::new(name, group);
                for record in self.triggers_for_job_locked(&job_key)? {
                    self.resume_trigger_locked(record.key(), now)?;
                }
            }
            debug!(group = %group, "Resumed job group");
            Ok(())
        })
    }

    /// Pause every known trigger group.
    pub fn pause_all(&self) -> Result<()> {
        for group in self.holder.all_trigger_groups.members()? {
            self.pause_trigger_group(&group)?;
        }
        Ok(())
    }

    /// Resume every paused trigger group.
    pub fn resume_all(&self) -> Result<()> {
        for group in self.holder.paused_trigger_groups.members()? {
            self.resume_trigger_group(&group)?;
        }
        Ok(())
    }

    pub fn get_paused_trigger_groups(&self) -> Result<Vec<String>> {
        Ok(self.holder.paused_trigger_groups.members()?)
    }

    pub fn is_trigger_group_paused(&self, group: &str) -> Result<bool> {
        Ok(self.holder.paused_trigger_groups.contains(&group.to_string())?)
    }

    pub fn is_job_group_paused(&self, group: &str) -> Result<bool> {
        Ok(self.holder.paused_job_groups.contains(&group.to_string())?)
    }
}
