//! Per-task deadlines composed around a handle.

use std::time::Duration;

use crate::core::{SchedulerError, TaskHandle};

/// Await `handle`, giving up after `after`.
///
/// Only the wait is abandoned: the task keeps its slot and runs to completion, and
/// its outcome is discarded. A still-pending task can be cancelled first with
/// [`TaskHandle::cancel`] if that is the intent.
///
/// # Errors
///
/// Returns `SchedulerError::Timeout` if the deadline elapses first, otherwise the
/// task's own outcome.
pub async fn with_timeout<T>(handle: TaskHandle<T>, after: Duration) -> Result<T, SchedulerError> {
    let sequence = handle.sequence();
    tokio::time::timeout(after, handle)
        .await
        .unwrap_or_else(|_| Err(SchedulerError::Timeout { sequence, after }))
}
