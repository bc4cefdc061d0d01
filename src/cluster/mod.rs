//! Shared Collection Layer contract and the in-process backend.
//!
//! The engine consumes these primitives, it does not implement replication:
//! any backend offering replace-on-put byte maps, sets, a byte-ordered
//! sorted set, and named locks with lease semantics can host a store.
//!
//! - `collections.rs` - raw byte collection traits and the backend factory
//! - `lock.rs` - named cluster lock with RAII guard
//! - `serialized.rs` - typed MessagePack layer over the raw collections
//! - `memory.rs` - in-process backend for single-node use and tests

mod collections;
mod lock;
mod memory;
mod serialized;

pub use collections::{ClusterBackend, RawMap, RawSet, RawSortedSet, StorageError};
pub use lock::{ClusterLock, LockError, LockGuard};
pub use memory::MemoryBackend;
pub use serialized::{SharedMap, SharedSet};
