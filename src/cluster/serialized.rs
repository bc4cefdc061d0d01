//! Typed MessagePack layer over the raw byte collections.
//!
//! Stored values always cross the collection boundary as full-snapshot
//! encodings: a `get` decodes a fresh copy, so a value held by a caller
//! never aliases store state, and a mutation is only visible after an
//! explicit `put` of the whole record.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::collections::{RawMap, RawSet, StorageError};

/// Encode a value as MessagePack.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a value from MessagePack.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Typed view over a shared byte map.
pub struct SharedMap<K, V> {
    raw: Arc<dyn RawMap>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for SharedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
            _marker: PhantomData,
        }
    }
}

impl<K, V> SharedMap<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn new(raw: Arc<dyn RawMap>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Publish a full value snapshot under `key`, replacing any prior one.
    pub fn put(&self, key: &K, value: &V) -> Result<(), StorageError> {
        self.raw.put(&encode(key)?, &encode(value)?)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, StorageError> {
        match self.raw.get(&encode(key)?)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, StorageError> {
        match self.raw.remove(&encode(key)?)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &K) -> Result<bool, StorageError> {
        self.raw.contains(&encode(key)?)
    }

    pub fn keys(&self) -> Result<Vec<K>, StorageError> {
        let mut out = Vec::new();
        for bytes in self.raw.keys()? {
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.raw.len()
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.raw.len()? == 0)
    }
}

/// Typed view over a shared byte set.
pub struct SharedSet<T> {
    raw: Arc<dyn RawSet>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SharedSet<T> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
            _marker: PhantomData,
        }
    }
}

impl<T> SharedSet<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(raw: Arc<dyn RawSet>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn add(&self, member: &T) -> Result<bool, StorageError> {
        self.raw.add(&encode(member)?)
    }

    pub fn remove(&self, member: &T) -> Result<bool, StorageError> {
        self.raw.remove(&encode(member)?)
    }

    pub fn contains(&self, member: &T) -> Result<bool, StorageError> {
        self.raw.contains(&encode(member)?)
    }

    pub fn members(&self) -> Result<Vec<T>, StorageError> {
        let mut out = Vec::new();
        for bytes in self.raw.members()? {
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.raw.len()
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.raw.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterBackend, MemoryBackend};

    #[test]
    fn test_get_returns_independent_copy() {
        let backend = MemoryBackend::new();
        let map: SharedMap<String, Vec<u32>> = SharedMap::new(backend.map("t"));

        let key = "k".to_string();
        map.put(&key, &vec![1, 2, 3]).unwrap();

        let mut copy = map.get(&key).unwrap().unwrap();
        copy.push(4);

        // the stored snapshot is unchanged until an explicit re-put
        assert_eq!(map.get(&key).unwrap().unwrap(), vec![1, 2, 3]);
        map.put(&key, &copy).unwrap();
        assert_eq!(map.get(&key).unwrap().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_same_name_resolves_same_state() {
        let backend = MemoryBackend::new();
        let a: SharedSet<String> = SharedSet::new(backend.set("s"));
        let b: SharedSet<String> = SharedSet::new(backend.set("s"));

        assert!(a.add(&"x".to_string()).unwrap());
        assert!(b.contains(&"x".to_string()).unwrap());
        assert!(!b.add(&"x".to_string()).unwrap());
    }
}
