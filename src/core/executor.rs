//! Reusable executors that turn payloads into tasks.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::AppResult;

/// Abstraction for executing a payload and producing a result.
///
/// The executor holds the business logic; each submitted payload becomes one
/// task on the scheduler. Executors are cloned into every task, so keep them
/// cheap to clone (share state behind an `Arc`).
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_bounded_scheduler::core::TaskExecutor;
///
/// #[derive(Clone)]
/// struct Thumbnailer;
///
/// #[async_trait]
/// impl TaskExecutor<std::path::PathBuf, Vec<u8>> for Thumbnailer {
///     async fn execute(&self, path: std::path::PathBuf) -> anyhow::Result<Vec<u8>> {
///         let bytes = tokio::fs::read(&path).await?;
///         Ok(shrink(&bytes))
///     }
/// }
///
/// let handles = scheduler.submit_payloads(&Thumbnailer, paths);
/// ```
#[async_trait]
pub trait TaskExecutor<P, T>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    T: Send + 'static,
{
    /// Execute a payload and return the result.
    ///
    /// Returning an error, or panicking, rejects only this payload's handle.
    async fn execute(&self, payload: P) -> AppResult<T>;
}

/// Bind a payload to an executor, yielding a zero-argument operation.
pub fn bind<P, T, E>(
    executor: E,
    payload: P,
) -> impl FnOnce() -> BoxFuture<'static, AppResult<T>> + Send + 'static
where
    P: Send + 'static,
    T: Send + 'static,
    E: TaskExecutor<P, T>,
{
    move || async move { executor.execute(payload).await }.boxed()
}
