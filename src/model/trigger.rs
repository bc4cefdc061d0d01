//! Trigger definition: when a job fires, at what priority, and how missed
//! fires are repaired.

use serde::{Deserialize, Serialize};

use super::Key;

/// Repeat without bound.
pub const REPEAT_INDEFINITELY: i32 = -1;

/// Priority assigned when none is given. Higher fires first on time ties.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Policy applied when a trigger's fire time is missed by more than the
/// configured misfire threshold. Applied once per repair, covering every
/// missed occurrence; repeated application never compounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisfirePolicy {
    /// Fire immediately, then continue on the original cadence.
    FireNow,
    /// Skip missed occurrences and wait for the next future one. A trigger
    /// with no future occurrence left is exhausted.
    Reschedule,
    /// Leave the fire time untouched; the trigger fires late.
    Ignore,
}

impl Default for MisfirePolicy {
    fn default() -> Self {
        MisfirePolicy::FireNow
    }
}

/// Schedule definition for a job. All times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDetail {
    pub key: Key,
    pub job_key: Key,
    #[serde(default)]
    pub description: Option<String>,
    /// First scheduled fire.
    pub start_time: u64,
    /// Milliseconds between fires; 0 = one-shot.
    #[serde(default)]
    pub repeat_interval: u64,
    /// Repeats after the first fire; negative = unbounded.
    #[serde(default)]
    pub repeat_count: i32,
    #[serde(default)]
    pub times_triggered: u32,
    /// Next scheduled fire; `None` once the schedule is exhausted.
    pub next_fire_time: Option<u64>,
    #[serde(default)]
    pub prev_fire_time: Option<u64>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub misfire_policy: MisfirePolicy,
    /// Exclusion calendar resolved by the host scheduler.
    #[serde(default)]
    pub calendar_name: Option<String>,
    /// Set at acquisition; identifies one claimed fire of this trigger.
    #[serde(default)]
    pub fire_instance_id: Option<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl TriggerDetail {
    /// One-shot trigger firing at `start_time`.
    pub fn new(key: Key, job_key: Key, start_time: u64) -> Self {
        Self {
            key,
            job_key,
            description: None,
            start_time,
            repeat_interval: 0,
            repeat_count: 0,
            times_triggered: 0,
            next_fire_time: Some(start_time),
            prev_fire_time: None,
            priority: DEFAULT_PRIORITY,
            misfire_policy: MisfirePolicy::default(),
            calendar_name: None,
            fire_instance_id: None,
        }
    }

    /// Repeating trigger: `repeat_count` additional fires spaced
    /// `repeat_interval` ms apart after the first.
    pub fn repeating(
        key: Key,
        job_key: Key,
        start_time: u64,
        repeat_interval: u64,
        repeat_count: i32,
    ) -> Self {
        let mut t = Self::new(key, job_key, start_time);
        t.repeat_interval = repeat_interval;
        t.repeat_count = repeat_count;
        t
    }

    /// Whether any fire remains.
    #[inline]
    pub fn may_fire_again(&self) -> bool {
        self.next_fire_time.is_some()
    }

    /// Advance the schedule past the fire that just happened.
    pub fn triggered(&mut self) {
        self.prev_fire_time = self.next_fire_time;
        self.times_triggered += 1;
        self.next_fire_time = self.next_after_fire();
    }

    fn next_after_fire(&self) -> Option<u64> {
        if self.repeat_interval == 0 {
            return None;
        }
        if self.repeat_count >= 0 && self.times_triggered > self.repeat_count as u32 {
            return None;
        }
        self.prev_fire_time.map(|t| t + self.repeat_interval)
    }

    /// Repair a missed fire time according to the misfire policy. One call
    /// covers every occurrence missed up to `now`.
    pub fn update_after_misfire(&mut self, now: u64) {
        let Some(next) = self.next_fire_time else {
            return;
        };
        if next >= now {
            return;
        }
        match self.misfire_policy {
            MisfirePolicy::Ignore => {}
            MisfirePolicy::FireNow => {
                self.next_fire_time = Some(now);
            }
            MisfirePolicy::Reschedule => {
                self.next_fire_time = self.first_fire_after(now);
            }
        }
    }

    /// First scheduled occurrence strictly after `now`, honoring the repeat
    /// bound; `None` when every remaining occurrence has passed.
    fn first_fire_after(&self, now: u64) -> Option<u64> {
        let next = self.next_fire_time?;
        if next > now {
            return Some(next);
        }
        if self.repeat_interval == 0 {
            return None;
        }
        let missed = (now - next) / self.repeat_interval + 1;
        if self.repeat_count >= 0 {
            let remaining =
                (self.repeat_count as u64 + 1).saturating_sub(self.times_triggered as u64);
            if missed >= remaining {
                return None;
            }
        }
        Some(next + missed * self.repeat_interval)
    }
}
