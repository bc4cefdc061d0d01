//! chronoq - clustered job scheduling engine.
//!
//! Multiple cooperating nodes share a cluster-wide family of collections
//! holding jobs and triggers, coordinate through a named cluster lock, and
//! independently acquire and fire due work without double execution. A
//! separate priority-ordered queue subsystem dispatches immediate jobs to a
//! bounded worker pool.
//!
//! The engine consumes shared map/set/sorted-set/lock primitives through
//! the [`cluster`] contract; it does not implement replication itself. An
//! in-process backend is provided for single-node deployments and tests.

pub mod cluster;
pub mod config;
pub mod error;
pub mod model;
pub mod queue;
pub mod store;
pub mod telemetry;
