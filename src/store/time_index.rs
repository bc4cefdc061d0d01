//! Time-ordered trigger index.
//!
//! One entry per WAITING trigger, ordered by (fire time ascending, priority
//! descending, key) through an order-preserving byte encoding, so any node
//! finds the globally next-due triggers with an ascending range scan.
//! Acquisition never scans the trigger map; it starts here.

use std::sync::Arc;

use crate::cluster::{RawSortedSet, StorageError};
use crate::model::Key;

/// One index entry. The encoded form sorts lexicographically in exactly
/// the order acquisition wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeTriggerEntry {
    pub fire_time: u64,
    pub priority: i32,
    pub key: Key,
}

impl TimeTriggerEntry {
    pub fn new(fire_time: u64, priority: i32, key: Key) -> Self {
        Self {
            fire_time,
            priority,
            key,
        }
    }

    /// Big-endian fire time, then the bitwise-inverted sign-biased priority
    /// (higher priority -> smaller bytes), then the length-prefixed group
    /// and the name.
    pub fn encode(&self) -> Vec<u8> {
        let group = self.key.group.as_bytes();
        let name = self.key.name.as_bytes();
        let mut buf = Vec::with_capacity(14 + group.len() + name.len());
        buf.extend_from_slice(&self.fire_time.to_be_bytes());
        buf.extend_from_slice(&(!bias_priority(self.priority)).to_be_bytes());
        buf.extend_from_slice(&(group.len() as u16).to_be_bytes());
        buf.extend_from_slice(group);
        buf.extend_from_slice(name);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < 14 {
            return Err(StorageError::Serialization(
                "time index entry too short".to_string(),
            ));
        }
        let mut time = [0u8; 8];
        time.copy_from_slice(&bytes[0..8]);
        let mut prio = [0u8; 4];
        prio.copy_from_slice(&bytes[8..12]);
        let mut glen = [0u8; 2];
        glen.copy_from_slice(&bytes[12..14]);
        let glen = u16::from_be_bytes(glen) as usize;
        if bytes.len() < 14 + glen {
            return Err(StorageError::Serialization(
                "time index entry truncated".to_string(),
            ));
        }
        let group = std::str::from_utf8(&bytes[14..14 + glen])
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let name = std::str::from_utf8(&bytes[14 + glen..])
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            fire_time: u64::from_be_bytes(time),
            priority: unbias_priority(!u32::from_be_bytes(prio)),
            key: Key::new(name, group),
        })
    }
}

/// Map an i32 onto a u32 preserving order.
#[inline]
fn bias_priority(priority: i32) -> u32 {
    (priority as i64 + i32::MAX as i64 + 1) as u32
}

#[inline]
fn unbias_priority(biased: u32) -> i32 {
    (biased as i64 - i32::MAX as i64 - 1) as i32
}

/// The cluster-shared index itself.
pub struct TimeTriggerIndex {
    raw: Arc<dyn RawSortedSet>,
}

impl TimeTriggerIndex {
    pub fn new(raw: Arc<dyn RawSortedSet>) -> Self {
        Self { raw }
    }

    pub fn insert(&self, entry: &TimeTriggerEntry) -> Result<bool, StorageError> {
        self.raw.insert(&entry.encode())
    }

    pub fn remove(&self, entry: &TimeTriggerEntry) -> Result<bool, StorageError> {
        self.raw.remove(&entry.encode())
    }

    pub fn remove_raw(&self, bytes: &[u8]) -> Result<bool, StorageError> {
        self.raw.remove(bytes)
    }

    /// Up to `limit` decoded entries at or after `cursor`, ascending, each
    /// paired with its raw encoding for exact removal.
    pub fn scan_from(
        &self,
        cursor: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, TimeTriggerEntry)>, StorageError> {
        let mut out = Vec::new();
        for bytes in self.raw.range_from(cursor, limit)? {
            let entry = TimeTriggerEntry::decode(&bytes)?;
            out.push((bytes, entry));
        }
        Ok(out)
    }

    pub fn first(&self) -> Result<Option<TimeTriggerEntry>, StorageError> {
        match self.raw.first()? {
            Some(bytes) => Ok(Some(TimeTriggerEntry::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.raw.len()
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.raw.len()? == 0)
    }
}
