//! Lifecycle of the daemon's workers.

use std::{collections::HashMap, future::Future, time::Duration};

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a worker may take to notice cancellation.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleeps for `period` unless `token` is cancelled first.
///
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(token: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(period) => true,
    }
}

/// Owns every spawned worker and the token that stops them.
///
/// Each worker gets a child of the root token; [`shutdown_all`] cancels the
/// root and waits for the workers to return.
///
/// [`shutdown_all`]: TaskManager::shutdown_all
pub struct TaskManager {
    workers: HashMap<String, JoinHandle<Result<()>>>,
    root: CancellationToken,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
            root: CancellationToken::new(),
        }
    }

    /// Spawns a named worker.
    pub fn spawn_task<F, Fut>(&mut self, name: &str, worker: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.workers.contains_key(name) {
            return Err(anyhow!("worker '{name}' is already running"));
        }

        let token = self.root.child_token();
        let worker_name = name.to_string();
        let handle = tokio::spawn(async move {
            match worker(token).await {
                Ok(()) => {
                    info!("Worker '{worker_name}' finished");
                    Ok(())
                }
                Err(e) => {
                    error!("Worker '{worker_name}' failed: {e:#}");
                    Err(e)
                }
            }
        });

        self.workers.insert(name.to_string(), handle);
        info!("Worker '{name}' spawned");
        Ok(())
    }

    /// Cancels every worker and waits for them.
    ///
    /// Returns the first failure after all workers are collected.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping {} workers", self.workers.len());
        self.root.cancel();

        let mut first_error = None;
        for (name, handle) in self.workers.drain() {
            let failure = match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(e))) => Some(e.context(format!("worker '{name}' failed"))),
                Ok(Err(e)) => Some(anyhow!("worker '{name}' panicked: {e}")),
                Err(_) => Some(anyhow!("worker '{name}' did not stop in time")),
            };
            if let Some(e) = failure {
                warn!("{e:#}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e).context("One or more workers failed during shutdown"),
            None => {
                info!("All workers stopped");
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
