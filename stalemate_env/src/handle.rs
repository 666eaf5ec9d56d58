//! Handle to a launched worker.

use crate::error::EnvError;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle returned by [`RuntimeContext::spawn`](crate::RuntimeContext::spawn).
///
/// Supports the two supervision styles the drivers need: an unbounded join
/// and a join bounded by a timeout, followed by forced termination of
/// workers that never came back.
pub struct WorkerHandle {
    /// Worker name (for reporting)
    name: String,

    /// Underlying task
    inner: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wraps a tokio join handle.
    pub fn new(name: impl Into<String>, inner: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Returns the worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the worker has run to completion (or was aborted).
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Waits for the worker without a deadline.
    pub async fn join(&mut self) -> Result<(), EnvError> {
        (&mut self.inner)
            .await
            .map_err(|e| EnvError::WorkerFailed(format!("{}: {}", self.name, e)))
    }

    /// Waits for the worker for at most `timeout`.
    ///
    /// # Returns
    /// * `Ok(())` - Worker finished
    /// * `Err(EnvError::Timeout)` - Worker still alive after `timeout`
    /// * `Err(EnvError::WorkerFailed)` - Worker panicked or was cancelled
    pub async fn join_timeout(&mut self, timeout: Duration) -> Result<(), EnvError> {
        match tokio::time::timeout(timeout, &mut self.inner).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EnvError::WorkerFailed(format!("{}: {}", self.name, e))),
            Err(_) => Err(EnvError::timeout(timeout)),
        }
    }

    /// Forcibly terminates the worker and waits until its task is dropped.
    ///
    /// Anything the worker did not release explicitly stays as it was.
    pub async fn abort_and_wait(self) {
        self.inner.abort();
        let _ = self.inner.await;
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("finished", &self.inner.is_finished())
            .finish()
    }
}
