//! In-process backend.
//!
//! Hosts a full collection family in local memory. The contract's
//! visibility rules are trivially satisfied inside one process, and the
//! lock's auto-release-on-holder-failure clause is vacuous (there are no
//! node failures to survive). Used for single-node deployments and
//! throughout the test suite.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};

use super::collections::{ClusterBackend, RawMap, RawSet, RawSortedSet, StorageError};
use super::lock::{ClusterLock, LockError};

#[derive(Default)]
pub struct MemoryBackend {
    maps: DashMap<String, Arc<MemoryMap>>,
    sets: DashMap<String, Arc<MemorySet>>,
    sorted_sets: DashMap<String, Arc<MemorySortedSet>>,
    locks: DashMap<String, Arc<MemoryLock>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ClusterBackend for MemoryBackend {
    fn map(&self, name: &str) -> Arc<dyn RawMap> {
        Arc::clone(self.maps.entry(name.to_string()).or_default().value()) as Arc<dyn RawMap>
    }

    fn set(&self, name: &str) -> Arc<dyn RawSet> {
        Arc::clone(self.sets.entry(name.to_string()).or_default().value()) as Arc<dyn RawSet>
    }

    fn sorted_set(&self, name: &str) -> Arc<dyn RawSortedSet> {
        Arc::clone(self.sorted_sets.entry(name.to_string()).or_default().value())
            as Arc<dyn RawSortedSet>
    }

    fn lock(&self, name: &str) -> Arc<dyn ClusterLock> {
        Arc::clone(self.locks.entry(name.to_string()).or_default().value()) as Arc<dyn ClusterLock>
    }
}

#[derive(Default)]
struct MemoryMap {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl RawMap for MemoryMap {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.write().remove(key))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.entries.read().contains_key(key))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, StorageError> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().len())
    }
}

#[derive(Default)]
struct MemorySet {
    members: RwLock<HashSet<Vec<u8>>>,
}

impl RawSet for MemorySet {
    fn add(&self, member: &[u8]) -> Result<bool, StorageError> {
        Ok(self.members.write().insert(member.to_vec()))
    }

    fn remove(&self, member: &[u8]) -> Result<bool, StorageError> {
        Ok(self.members.write().remove(member))
    }

    fn contains(&self, member: &[u8]) -> Result<bool, StorageError> {
        Ok(self.members.read().contains(member))
    }

    fn members(&self) -> Result<Vec<Vec<u8>>, StorageError> {
        Ok(self.members.read().iter().cloned().collect())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.members.read().len())
    }
}

#[derive(Default)]
struct MemorySortedSet {
    entries: RwLock<BTreeSet<Vec<u8>>>,
}

impl RawSortedSet for MemorySortedSet {
    fn insert(&self, entry: &[u8]) -> Result<bool, StorageError> {
        Ok(self.entries.write().insert(entry.to_vec()))
    }

    fn remove(&self, entry: &[u8]) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(entry))
    }

    fn range_from(&self, start: &[u8], limit: usize) -> Result<Vec<Vec<u8>>, StorageError> {
        Ok(self
            .entries
            .read()
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .take(limit)
            .cloned()
            .collect())
    }

    fn first(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().iter().next().cloned())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().len())
    }
}

#[derive(Default)]
struct MemoryLock {
    held: Mutex<bool>,
    cond: Condvar,
}

impl ClusterLock for MemoryLock {
    fn acquire(&self, timeout: Duration) -> Result<(), LockError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while *held {
            if self.cond.wait_until(&mut held, deadline).timed_out() {
                return Err(LockError::Timeout);
            }
        }
        *held = true;
        Ok(())
    }

    fn release(&self) {
        let mut held = self.held.lock();
        *held = false;
        self.cond.notify_one();
    }
}
