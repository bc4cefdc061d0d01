//! Named cluster-wide mutual exclusion.

use std::fmt;
use std::time::Duration;

/// Lock acquisition error.
#[derive(Debug, Clone)]
pub enum LockError {
    /// The lock was not acquired within the requested bound.
    Timeout,
    /// Backend reported a failure.
    Backend(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Timeout => write!(f, "lock acquisition timed out"),
            LockError::Backend(e) => write!(f, "lock backend error: {}", e),
        }
    }
}

impl std::error::Error for LockError {}

/// Named mutual-exclusion lock spanning every node of the cluster.
///
/// Implementations must release the lock automatically when its holder
/// fails (lease/fencing semantics); a crashed holder must never deadlock
/// the cluster.
pub trait ClusterLock: Send + Sync {
    /// Block until the lock is held or `timeout` elapses.
    fn acquire(&self, timeout: Duration) -> Result<(), LockError>;
    fn release(&self);
}

/// RAII guard for a lock section; releases on drop.
pub struct LockGuard<'a> {
    lock: &'a dyn ClusterLock,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(lock: &'a dyn ClusterLock, timeout: Duration) -> Result<Self, LockError> {
        lock.acquire(timeout)?;
        Ok(Self { lock })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
