//! Raw shared-collection contract.

use std::fmt;
use std::sync::Arc;

use super::lock::ClusterLock;

/// Shared collection layer error.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Record could not be encoded or decoded.
    Serialization(String),
    /// Backend reported a failure.
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Serialization(e) => write!(f, "serialization error: {}", e),
            StorageError::Backend(e) => write!(f, "backend error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Replace-on-put byte map. A successful `put` is visible cluster-wide;
/// partial in-place mutation of stored values is never assumed.
pub trait RawMap: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn contains(&self, key: &[u8]) -> Result<bool, StorageError>;
    fn keys(&self) -> Result<Vec<Vec<u8>>, StorageError>;
    fn len(&self) -> Result<usize, StorageError>;
}

/// Byte-element set.
pub trait RawSet: Send + Sync {
    /// Returns true when the member was newly added.
    fn add(&self, member: &[u8]) -> Result<bool, StorageError>;
    /// Returns true when the member was present.
    fn remove(&self, member: &[u8]) -> Result<bool, StorageError>;
    fn contains(&self, member: &[u8]) -> Result<bool, StorageError>;
    fn members(&self) -> Result<Vec<Vec<u8>>, StorageError>;
    fn len(&self) -> Result<usize, StorageError>;
}

/// Lexicographically byte-ordered set supporting ascending range scans.
pub trait RawSortedSet: Send + Sync {
    fn insert(&self, entry: &[u8]) -> Result<bool, StorageError>;
    fn remove(&self, entry: &[u8]) -> Result<bool, StorageError>;
    /// Up to `limit` entries >= `start`, ascending.
    fn range_from(&self, start: &[u8], limit: usize) -> Result<Vec<Vec<u8>>, StorageError>;
    fn first(&self) -> Result<Option<Vec<u8>>, StorageError>;
    fn len(&self) -> Result<usize, StorageError>;
}

/// Factory resolving collection names to shared collections. Resolving the
/// same name twice yields views over the same cluster-wide state.
pub trait ClusterBackend: Send + Sync {
    fn map(&self, name: &str) -> Arc<dyn RawMap>;
    fn set(&self, name: &str) -> Arc<dyn RawSet>;
    fn sorted_set(&self, name: &str) -> Arc<dyn RawSortedSet>;
    fn lock(&self, name: &str) -> Arc<dyn ClusterLock>;
}
