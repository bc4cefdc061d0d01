//! Queue job dispatch.
//!
//! A dedicated dispatcher drains the pending set in priority order and
//! hands jobs to a bounded worker pool. A worker permit is claimed before
//! a job is popped, so hand-off removal happens at most once per free
//! worker; with no pending work the dispatcher parks until a push or
//! shutdown wakes it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::config::ShutdownMode;
use crate::error::Result;
use crate::model::QueueJobDetail;

use super::manager::QueueJobManager;

/// Host-supplied execution entry point for queue jobs. The host resolves
/// `job_class` references to whatever implementation it runs.
#[async_trait]
pub trait QueueJobExecutor: Send + Sync + 'static {
    /// Run one queue job. A returned error is contained and logged; it
    /// never reaches the dispatch loop.
    async fn execute(&self, job: QueueJobDetail) -> Result<()>;
}

/// Handle over a running dispatcher; used to shut it down.
pub struct DispatcherHandle {
    manager: Arc<QueueJobManager>,
    join: JoinHandle<()>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl DispatcherHandle {
    /// Stop dispatching. `Wait` lets in-flight executions finish; `Abort`
    /// cancels them best-effort. Returns once all workers are idle.
    pub async fn shutdown(self, mode: ShutdownMode) {
        self.manager.shutdown();
        let _ = self.join.await;
        let mut tasks = self.tasks.lock().await;
        if mode == ShutdownMode::Abort {
            tasks.abort_all();
        }
        while tasks.join_next().await.is_some() {}
        info!("Queue dispatcher shut down");
    }
}

impl QueueJobManager {
    /// Spawn the dispatch loop against `executor`.
    pub fn start_dispatcher(self: &Arc<Self>, executor: Arc<dyn QueueJobExecutor>) -> DispatcherHandle {
        let workers = Arc::new(Semaphore::new(self.config.worker_count));
        let tasks: Arc<Mutex<JoinSet<()>>> = Arc::new(Mutex::new(JoinSet::new()));
        let join = tokio::spawn(run_dispatch_loop(
            Arc::clone(self),
            executor,
            workers,
            Arc::clone(&tasks),
        ));
        DispatcherHandle {
            manager: Arc::clone(self),
            join,
            tasks,
        }
    }
}

async fn run_dispatch_loop(
    manager: Arc<QueueJobManager>,
    executor: Arc<dyn QueueJobExecutor>,
    workers: Arc<Semaphore>,
    tasks: Arc<Mutex<JoinSet<()>>>,
) {
    info!(workers = manager.config.worker_count, "Queue dispatcher started");

    'outer: loop {
        if manager.is_shutdown() {
            break;
        }

        // a worker slot first; popping without one could strand a job
        let permit = tokio::select! {
            permit = workers.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = manager.notify.notified() => continue,
        };

        let job = loop {
            if manager.is_shutdown() {
                break 'outer;
            }
            match manager.claim_next() {
                Ok(Some(job)) => break job,
                Ok(None) => {
                    tokio::select! {
                        _ = manager.notify.notified() => {}
                        _ = tokio::time::sleep(manager.config.idle_poll) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Dispatch claim failed; retrying");
                    tokio::time::sleep(manager.config.idle_poll).await;
                }
            }
        };

        let executor = Arc::clone(&executor);
        let mut set = tasks.lock().await;
        set.spawn(async move {
            let key = job.key.clone();
            if let Err(e) = executor.execute(job).await {
                error!(job = %key, error = %e, "Queue job execution failed");
            }
            drop(permit);
        });
        // reap finished workers opportunistically
        while set.try_join_next().is_some() {}
    }

    info!("Queue dispatcher stopped");
}
