//! Engine configuration.
//!
//! Environment-based configuration for the clustered store and the queue
//! job dispatcher.

use std::time::Duration;

/// Configuration for a clustered job store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store name; namespaces the shared collection family so multiple
    /// stores can share one backing cluster.
    pub store_name: String,
    /// Prefix for all shared collection names.
    pub prefix: String,
    /// Node identifier for this instance (auto-generated if not set).
    pub node_id: Option<String>,
    /// A trigger whose fire time is older than now minus this threshold is
    /// repaired through its misfire policy before acquisition.
    pub misfire_threshold: Duration,
    /// Default look-ahead window for acquisition when the caller passes
    /// no window of its own.
    pub batch_time_window: Duration,
    /// An acquired-but-unfired claim older than this is released back to
    /// the waiting set by the recovery sweep, even if its owner is alive.
    pub claim_timeout: Duration,
    /// How long a node liveness lease stays valid without a heartbeat.
    pub node_lease_ttl: Duration,
    /// Cadence of the coordination task (heartbeat + recovery sweep).
    pub heartbeat_interval: Duration,
    /// Bound on waiting for the store-wide lock.
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_name: "default".to_string(),
            prefix: "chronoq".to_string(),
            node_id: None,
            misfire_threshold: Duration::from_secs(60),
            batch_time_window: Duration::ZERO,
            claim_timeout: Duration::from_secs(300),
            node_lease_ttl: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            lock_timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHRONOQ_STORE_NAME`: Store name (default: default)
    /// - `CHRONOQ_PREFIX`: Collection name prefix (default: chronoq)
    /// - `NODE_ID`: Node identifier (auto-generated if not set)
    /// - `CHRONOQ_MISFIRE_THRESHOLD_MS`: Misfire threshold (default: 60000)
    /// - `CHRONOQ_BATCH_TIME_WINDOW_MS`: Acquisition look-ahead (default: 0)
    /// - `CHRONOQ_CLAIM_TIMEOUT_MS`: Claim release timeout (default: 300000)
    /// - `CHRONOQ_NODE_LEASE_TTL_MS`: Liveness lease TTL (default: 10000)
    /// - `CHRONOQ_HEARTBEAT_INTERVAL_MS`: Coordination cadence (default: 3000)
    /// - `CHRONOQ_LOCK_TIMEOUT_MS`: Lock wait bound (default: 30000)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("CHRONOQ_STORE_NAME") {
            config.store_name = name;
        }

        if let Ok(prefix) = std::env::var("CHRONOQ_PREFIX") {
            config.prefix = prefix;
        }

        if let Ok(node_id) = std::env::var("NODE_ID") {
            config.node_id = Some(node_id);
        }

        if let Some(ms) = env_ms("CHRONOQ_MISFIRE_THRESHOLD_MS") {
            config.misfire_threshold = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_BATCH_TIME_WINDOW_MS") {
            config.batch_time_window = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_CLAIM_TIMEOUT_MS") {
            config.claim_timeout = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_NODE_LEASE_TTL_MS") {
            config.node_lease_ttl = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_LOCK_TIMEOUT_MS") {
            config.lock_timeout = ms;
        }

        config
    }

    /// Resolve the node ID, generating one if not provided. Claim and
    /// lease ownership hang off this value, so generated ids are random,
    /// never time-derived.
    pub fn node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(|| {
            use uuid::Uuid;
            format!(
                "node-{}",
                Uuid::new_v4()
                    .to_string()
                    .split('-')
                    .next()
                    .unwrap_or("unknown")
            )
        })
    }

    /// Full shared-collection name with prefix and store name.
    #[inline]
    pub fn collection(&self, name: &str) -> String {
        format!("{}-{}-{}", self.prefix, self.store_name, name)
    }
}

/// How the queue dispatcher treats in-flight executions at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop intake and return after all workers are idle.
    Wait,
    /// Cancel in-flight executions best-effort.
    Abort,
}

/// Configuration for the queue job dispatch subsystem.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Size of the worker pool.
    pub worker_count: usize,
    /// Poll interval while the backlog is empty.
    pub idle_poll: Duration,
    /// Bound on waiting for the queue lock.
    pub lock_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            idle_poll: Duration::from_millis(500),
            lock_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHRONOQ_WORKER_COUNT`: Worker pool size (default: 4)
    /// - `CHRONOQ_IDLE_POLL_MS`: Empty-backlog poll interval (default: 500)
    /// - `CHRONOQ_QUEUE_LOCK_TIMEOUT_MS`: Queue lock bound (default: 30000)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(count) = std::env::var("CHRONOQ_WORKER_COUNT") {
            if let Ok(n) = count.parse() {
                config.worker_count = n;
            }
        }

        if let Some(ms) = env_ms("CHRONOQ_IDLE_POLL_MS") {
            config.idle_poll = ms;
        }

        if let Some(ms) = env_ms("CHRONOQ_QUEUE_LOCK_TIMEOUT_MS") {
            config.lock_timeout = ms;
        }

        config
    }
}

fn env_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}
