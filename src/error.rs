//! Error taxonomy for store and queue operations.

use std::fmt;

use crate::cluster::{LockError, StorageError};

/// Engine error type.
#[derive(Debug)]
pub enum SchedulerError {
    /// Operation referenced an unknown key.
    NotFound(String),
    /// Creation collided with an existing identity.
    DuplicateKey(String),
    /// A state-machine invariant was violated, e.g. a trigger referencing
    /// a missing job. The offending record is quarantined, not fatal.
    InconsistentState(String),
    /// The cluster lock could not be acquired within the configured bound.
    /// The operation aborts; callers retry on their next cycle.
    LockUnavailable(String),
    /// The dispatched job itself failed. Store state is unaffected.
    JobExecution(String),
    /// Shared collection layer failure.
    Storage(StorageError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::NotFound(msg) => write!(f, "not found: {}", msg),
            SchedulerError::DuplicateKey(msg) => write!(f, "duplicate key: {}", msg),
            SchedulerError::InconsistentState(msg) => write!(f, "inconsistent state: {}", msg),
            SchedulerError::LockUnavailable(msg) => write!(f, "lock unavailable: {}", msg),
            SchedulerError::JobExecution(msg) => write!(f, "job execution failed: {}", msg),
            SchedulerError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<StorageError> for SchedulerError {
    fn from(e: StorageError) -> Self {
        SchedulerError::Storage(e)
    }
}

impl From<LockError> for SchedulerError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Timeout => {
                SchedulerError::LockUnavailable("lock acquisition timed out".to_string())
            }
            LockError::Backend(msg) => SchedulerError::Storage(StorageError::Backend(msg)),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
