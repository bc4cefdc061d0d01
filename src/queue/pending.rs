//! Cluster-visible pending set for queue jobs.
//!
//! Entries order by (priority descending, insertion sequence ascending,
//! key) through the same order-preserving byte encoding trick as the time
//! index, so the head of the shared sorted set is always the next job to
//! dispatch.

use std::sync::Arc;

use crate::cluster::{RawSortedSet, StorageError};
use crate::model::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEntry {
    pub priority: i32,
    pub seq: u64,
    pub key: Key,
}

impl PendingEntry {
    /// Inverted sign-biased priority (higher priority -> smaller bytes),
    /// big-endian sequence, then the length-prefixed group and the name.
    fn encode(&self) -> Vec<u8> {
        let group = self.key.group.as_bytes();
        let name = self.key.name.as_bytes();
        let mut buf = Vec::with_capacity(14 + group.len() + name.len());
        buf.extend_from_slice(&(!bias_priority(self.priority)).to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&(group.len() as u16).to_be_bytes());
        buf.extend_from_slice(group);
        buf.extend_from_slice(name);
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < 14 {
            return Err(StorageError::Serialization(
                "pending entry too short".to_string(),
            ));
        }
        let mut prio = [0u8; 4];
        prio.copy_from_slice(&bytes[0..4]);
        let mut seq = [0u8; 8];
        seq.copy_from_slice(&bytes[4..12]);
        let mut glen = [0u8; 2];
        glen.copy_from_slice(&bytes[12..14]);
        let glen = u16::from_be_bytes(glen) as usize;
        if bytes.len() < 14 + glen {
            return Err(StorageError::Serialization(
                "pending entry truncated".to_string(),
            ));
        }
        let group = std::str::from_utf8(&bytes[14..14 + glen])
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let name = std::str::from_utf8(&bytes[14 + glen..])
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            priority: unbias_priority(!u32::from_be_bytes(prio)),
            seq: u64::from_be_bytes(seq),
            key: Key::new(name, group),
        })
    }
}

#[inline]
fn bias_priority(priority: i32) -> u32 {
    (priority as i64 + i32::MAX as i64 + 1) as u32
}

#[inline]
fn unbias_priority(biased: u32) -> i32 {
    (biased as i64 - i32::MAX as i64 - 1) as i32
}

pub(crate) struct PendingSet {
    raw: Arc<dyn RawSortedSet>,
}

impl PendingSet {
    pub(crate) fn new(raw: Arc<dyn RawSortedSet>) -> Self {
        Self { raw }
    }

    pub(crate) fn insert(&self, entry: &PendingEntry) -> Result<bool, StorageError> {
        self.raw.insert(&entry.encode())
    }

    pub(crate) fn remove(&self, entry: &PendingEntry) -> Result<bool, StorageError> {
        self.raw.remove(&entry.encode())
    }

    /// Take the highest-priority entry. Callers hold the queue lock, so
    /// peek-then-remove is atomic cluster-wide.
    pub(crate) fn pop_first(&self) -> Result<Option<PendingEntry>, StorageError> {
        let Some(bytes) = self.raw.first()? else {
            return Ok(None);
        };
        self.raw.remove(&bytes)?;
        Ok(Some(PendingEntry::decode(&bytes)?))
    }

    pub(crate) fn len(&self) -> Result<usize, StorageError> {
        self.raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: i32, seq: u64, name: &str) -> PendingEntry {
        PendingEntry {
            priority,
            seq,
            key: Key::of(name),
        }
    }

    #[test]
    fn test_encode_round_trip() {
        let e = PendingEntry {
            priority: -3,
            seq: 42,
            key: Key::new("resize", "images"),
        };
        assert_eq!(PendingEntry::decode(&e.encode()).unwrap(), e);
    }

    #[test]
    fn test_higher_priority_sorts_first() {
        assert!(entry(7, 10, "a").encode() < entry(5, 1, "a").encode());
        assert!(entry(0, 10, "a").encode() < entry(-1, 1, "a").encode());
    }

    #[test]
    fn test_insertion_order_breaks_priority_ties() {
        assert!(entry(5, 1, "b").encode() < entry(5, 2, "a").encode());
    }
}
