//! Caller-facing handle for a submitted task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::core::scheduler::Core;
use crate::core::task::StatusCell;
use crate::core::SchedulerError;
use crate::util::serde::{TaskId, TaskState};

/// Eventual outcome of one submitted task.
///
/// Awaiting the handle yields exactly that task's result, independent of every
/// other task. Dropping the handle does not cancel the task; use
/// [`TaskHandle::cancel`] for tasks that have not started yet.
#[must_use = "dropping a handle discards the task's outcome"]
pub struct TaskHandle<T> {
    sequence: TaskId,
    status: Arc<StatusCell>,
    rx: oneshot::Receiver<Result<T, SchedulerError>>,
    core: Weak<Core>,
}

impl<T> TaskHandle<T> {
    pub(crate) const fn new(
        sequence: TaskId,
        status: Arc<StatusCell>,
        rx: oneshot::Receiver<Result<T, SchedulerError>>,
        core: Weak<Core>,
    ) -> Self {
        Self {
            sequence,
            status,
            rx,
            core,
        }
    }

    /// Sequence number assigned at submission.
    #[must_use]
    pub const fn sequence(&self) -> TaskId {
        self.sequence
    }

    /// Current lifecycle state of the task.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.status.get()
    }

    /// Remove the task from the queue if it has not started.
    ///
    /// Returns `true` if the task was pending and is now cancelled; awaiting the
    /// handle then yields [`SchedulerError::Cancelled`]. Returns `false` if the
    /// task is already running or settled, in which case it runs to completion.
    pub fn cancel(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.cancel(self.sequence))
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, SchedulerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sequence = self.sequence;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => {
                Poll::Ready(Err(SchedulerError::Dropped(sequence)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("sequence", &self.sequence)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
