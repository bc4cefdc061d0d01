//! Core data model shared by the store and the queue subsystem.
//!
//! - `key.rs` - (name, group) identity
//! - `job.rs` - job definition and flags
//! - `trigger.rs` - trigger definition with schedule payload and misfire policy
//! - `queue_job.rs` - immediate-execution queue job definition

mod job;
mod key;
mod queue_job;
mod trigger;

pub use job::JobDetail;
pub use key::{Key, DEFAULT_GROUP};
pub use queue_job::QueueJobDetail;
pub use trigger::{MisfirePolicy, TriggerDetail, DEFAULT_PRIORITY, REPEAT_INDEFINITELY};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as epoch milliseconds.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
