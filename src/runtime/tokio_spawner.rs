//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use crate::core::{SchedulerError, Spawn};

/// Runtime built by the spawner itself. Shut down without blocking, so the last
/// clone may be dropped from inside a task.
#[derive(Debug)]
struct OwnedRuntime(Option<tokio::runtime::Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Tokio-based spawner that executes tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
    owned: Option<Arc<OwnedRuntime>>,
}

impl TokioSpawner {
    /// Create a new `TokioSpawner` from a tokio runtime handle.
    #[must_use]
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Create a spawner on a new multi-threaded runtime with `worker_threads`
    /// workers. The runtime lives as long as any clone of the spawner.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Configuration` if `worker_threads` is 0
    /// - `SchedulerError::Runtime` if the runtime cannot be built
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, SchedulerError> {
        if worker_threads == 0 {
            return Err(SchedulerError::Configuration(
                "worker_threads must be greater than 0".into(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("bounded-scheduler-worker")
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Spawner bound to the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Runtime` outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Runtime(e.to_string()))
    }

    /// Handle of the runtime tasks are spawned on.
    #[must_use]
    pub const fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(fut));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(matches!(TokioSpawner::current(), Err(SchedulerError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_current_inside_runtime() {
        assert!(TokioSpawner::current().is_ok());
    }

    #[test]
    fn test_with_worker_threads_rejects_zero() {
        assert!(matches!(
            TokioSpawner::with_worker_threads(0),
            Err(SchedulerError::Configuration(_))
        ));
    }

    #[test]
    fn test_with_worker_threads_keeps_runtime_alive() {
        let spawner = TokioSpawner::with_worker_threads(2).unwrap();
        let (tx, rx) = futures::channel::oneshot::channel();
        spawner.clone().spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            let _ = tx.send(std::thread::current().name().map(str::to_owned));
        });

        let worker = futures::executor::block_on(rx).unwrap();
        assert_eq!(worker.as_deref(), Some("bounded-scheduler-worker"));
    }
}
