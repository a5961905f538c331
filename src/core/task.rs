//! Task operations and the type-erased records the scheduler queues.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::{SchedulerError, TaskError};
use crate::util::serde::{TaskId, TaskState};

/// An opaque unit of asynchronous work.
///
/// Implemented for every `FnOnce() -> impl Future<Output = Result<T, E>>` closure
/// whose error converts into [`anyhow::Error`], so plain async closures can be
/// submitted directly:
///
/// ```rust,ignore
/// let handle = scheduler.submit(|| async {
///     let body = fetch("https://example.com").await?;
///     Ok::<_, anyhow::Error>(body.len())
/// });
/// ```
pub trait Operation<T>: Send + 'static {
    /// Start the operation. Anything done before the returned future is first
    /// polled runs synchronously inside the scheduler's admission pass.
    fn invoke(self) -> BoxFuture<'static, anyhow::Result<T>>;
}

impl<T, E, F, Fut> Operation<T> for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
    T: 'static,
{
    fn invoke(self) -> BoxFuture<'static, anyhow::Result<T>> {
        let fut = self();
        async move { fut.await.map_err(Into::into) }.boxed()
    }
}

/// Shared, lock-free view of a task's lifecycle state.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn pending() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(TaskState::Pending as u8)))
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// How a launched task settled.
#[derive(Debug)]
pub(crate) enum Settlement {
    Fulfilled,
    Rejected(String),
}

/// Type-erased task body paired with the sender half of its handle.
pub(crate) trait Dispatch: Send {
    /// Invoke the operation now and return a future that settles the handle.
    fn launch(self: Box<Self>, sequence: TaskId, status: Arc<StatusCell>)
        -> BoxFuture<'static, Settlement>;

    /// Settle the handle as cancelled without running the operation.
    fn cancel(self: Box<Self>, sequence: TaskId, status: &StatusCell);
}

pub(crate) struct Job<T, O> {
    op: O,
    tx: oneshot::Sender<Result<T, SchedulerError>>,
}

impl<T, O> Job<T, O>
where
    T: Send + 'static,
    O: Operation<T>,
{
    pub(crate) fn new(op: O) -> (Self, oneshot::Receiver<Result<T, SchedulerError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { op, tx }, rx)
    }
}

impl<T, O> Dispatch for Job<T, O>
where
    T: Send + 'static,
    O: Operation<T>,
{
    fn launch(
        self: Box<Self>,
        sequence: TaskId,
        status: Arc<StatusCell>,
    ) -> BoxFuture<'static, Settlement> {
        let Self { op, tx } = *self;
        // A panic while building the future counts as a task failure.
        let invoked = panic::catch_unwind(AssertUnwindSafe(move || op.invoke()));

        async move {
            let outcome = match invoked {
                Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::failed(sequence, err)),
                    Err(payload) => Err(TaskError::panicked(sequence, payload.as_ref())),
                },
                Err(payload) => Err(TaskError::panicked(sequence, payload.as_ref())),
            };

            let settlement = match &outcome {
                Ok(_) => {
                    status.set(TaskState::Fulfilled);
                    Settlement::Fulfilled
                }
                Err(err) => {
                    status.set(TaskState::Rejected);
                    Settlement::Rejected(err.to_string())
                }
            };

            // The caller may have dropped its handle; the outcome is simply discarded.
            let _ = tx.send(outcome.map_err(SchedulerError::from));
            settlement
        }
        .boxed()
    }

    fn cancel(self: Box<Self>, sequence: TaskId, status: &StatusCell) {
        status.set(TaskState::Cancelled);
        let _ = self.tx.send(Err(SchedulerError::Cancelled(sequence)));
    }
}

/// Queued task awaiting a free slot.
pub(crate) struct TaskRecord {
    pub(crate) sequence: TaskId,
    pub(crate) status: Arc<StatusCell>,
    pub(crate) dispatch: Box<dyn Dispatch>,
}
