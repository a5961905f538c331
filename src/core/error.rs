//! Error types for scheduler operations.

use std::time::Duration;

use thiserror::Error;

use crate::util::serde::TaskId;

/// Boxed error carried as the source of a failed task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by scheduler components.
///
/// Only [`SchedulerError::Configuration`] and [`SchedulerError::Runtime`] are ever
/// returned synchronously (at construction). Every other variant settles a single
/// [`TaskHandle`](crate::core::TaskHandle) and never escapes `submit`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid scheduler configuration, e.g. a concurrency limit below 1.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The task's own operation failed.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// The task was removed from the queue before it started.
    #[error("task {0} cancelled before it started")]
    Cancelled(TaskId),
    /// The scheduler was dropped while the task was still pending.
    #[error("task {0} dropped before it settled")]
    Dropped(TaskId),
    /// A caller-side deadline elapsed before the task settled.
    #[error("task {sequence} did not settle within {after:?}")]
    Timeout {
        /// Sequence number of the task being awaited.
        sequence: TaskId,
        /// Deadline that elapsed.
        after: Duration,
    },
    /// No async runtime was available to drive tasks.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl SchedulerError {
    /// Sequence number of the task this error settled, if it is task-scoped.
    #[must_use]
    pub const fn sequence(&self) -> Option<TaskId> {
        match self {
            Self::Task(err) => Some(err.sequence()),
            Self::Cancelled(sequence) | Self::Dropped(sequence) => Some(*sequence),
            Self::Timeout { sequence, .. } => Some(*sequence),
            Self::Configuration(_) | Self::Runtime(_) => None,
        }
    }
}

/// Failure raised by an individual task's operation.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The operation's future resolved to an error.
    #[error("task {sequence} failed: {source}")]
    Failed {
        /// Sequence number of the failing task.
        sequence: TaskId,
        /// Error returned by the operation.
        #[source]
        source: BoxError,
    },
    /// The operation panicked, either when invoked or while being polled.
    #[error("task {sequence} panicked: {message}")]
    Panicked {
        /// Sequence number of the panicking task.
        sequence: TaskId,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl TaskError {
    /// Sequence number of the task that failed.
    #[must_use]
    pub const fn sequence(&self) -> TaskId {
        match self {
            Self::Failed { sequence, .. } | Self::Panicked { sequence, .. } => *sequence,
        }
    }

    pub(crate) fn failed(sequence: TaskId, err: anyhow::Error) -> Self {
        Self::Failed {
            sequence,
            source: err.into(),
        }
    }

    pub(crate) fn panicked(sequence: TaskId, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked { sequence, message }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
