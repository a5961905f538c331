//! Concurrency-bounded FIFO scheduler.
//!
//! Tasks enter a FIFO queue and are admitted into at most `concurrency_limit`
//! slots in submission order. Every submission and every completion triggers an
//! admission pass, so the scheduler drives itself without polling.
//!
//! Bookkeeping (enqueue, dequeue, slot counting) happens under one
//! `parking_lot::Mutex` and never suspends. Only one thread runs the admission
//! loop at a time; others record their change and leave, and the active loop
//! picks it up before it stops. This keeps operations invoked in admission order
//! and lets a task submit more work from inside its own operation.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::events::{build_event, EventSink, Transition};
use crate::core::executor::{bind, TaskExecutor};
use crate::core::handle::TaskHandle;
use crate::core::task::{Dispatch, Job, Operation, Settlement, StatusCell, TaskRecord};
use crate::core::SchedulerError;
use crate::util::serde::{TaskId, TaskState};

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a future to run to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Snapshot of scheduler utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Scheduler name from its configuration.
    pub name: String,
    /// Maximum simultaneously running tasks.
    pub concurrency_limit: usize,
    /// Tasks currently occupying a slot.
    pub running: usize,
    /// Tasks waiting for a slot.
    pub pending: usize,
    /// Total tasks submitted.
    pub submitted: u64,
    /// Tasks that settled with a value.
    pub fulfilled: u64,
    /// Tasks that settled with an error or panic.
    pub rejected: u64,
    /// Tasks removed from the queue before starting.
    pub cancelled: u64,
}

/// Mutable scheduler state, only touched with the lock held.
#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<TaskRecord>,
    running: usize,
    next_sequence: TaskId,
    /// An admission loop is active on some thread.
    pumping: bool,
    submitted: u64,
    fulfilled: u64,
    rejected: u64,
    cancelled: u64,
}

/// Runtime-independent part of the scheduler. Handles hold a weak reference to it
/// for cancellation.
pub(crate) struct Core {
    id: Uuid,
    name: String,
    limit: usize,
    state: Mutex<SchedulerState>,
    events: Option<Arc<dyn EventSink>>,
}

impl Core {
    /// Record a transition. A panicking sink loses the event, never the slot.
    fn emit(&self, state: &SchedulerState, sequence: TaskId, transition: Transition) {
        let Some(sink) = &self.events else {
            return;
        };
        let event = build_event(
            self.id,
            sequence,
            transition,
            state.running,
            state.queue.len(),
        );
        if panic::catch_unwind(AssertUnwindSafe(|| sink.record(event))).is_err() {
            tracing::warn!(scheduler = %self.name, sequence, ?transition, "event sink panicked");
        }
    }

    /// Append a pending record and return its sequence number.
    fn enqueue(
        &self,
        state: &mut SchedulerState,
        dispatch: Box<dyn Dispatch>,
        status: Arc<StatusCell>,
    ) -> TaskId {
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.submitted += 1;
        state.queue.push_back(TaskRecord {
            sequence,
            status,
            dispatch,
        });
        self.emit(state, sequence, Transition::Submitted);
        sequence
    }

    /// Pop the oldest pending record into a free slot, if both exist.
    fn try_admit(&self, state: &mut SchedulerState) -> Option<TaskRecord> {
        if state.running >= self.limit {
            return None;
        }
        let record = state.queue.pop_front()?;
        state.running += 1;
        record.status.set(TaskState::Running);
        self.emit(state, record.sequence, Transition::Started);
        Some(record)
    }

    /// Remove a pending task from the queue and settle it as cancelled.
    pub(crate) fn cancel(&self, sequence: TaskId) -> bool {
        let record = {
            let mut state = self.state.lock();
            let Some(pos) = state.queue.iter().position(|r| r.sequence == sequence) else {
                return false;
            };
            let Some(record) = state.queue.remove(pos) else {
                return false;
            };
            state.cancelled += 1;
            record.status.set(TaskState::Cancelled);
            self.emit(&state, sequence, Transition::Cancelled);
            record
        };

        tracing::debug!(scheduler = %self.name, sequence, "cancelled pending task");
        record.dispatch.cancel(sequence, &record.status);
        true
    }
}

/// Resets the pumping flag if the admission loop unwinds.
struct PumpGuard<'a> {
    core: &'a Core,
    finished: bool,
}

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.core.state.lock().pumping = false;
        }
    }
}

struct Inner<S> {
    core: Arc<Core>,
    spawner: S,
}

/// Slot held by a launched task. Dropping it releases the slot, also when the
/// driving future is discarded before the task settles.
struct Slot<S>
where
    S: Spawn + Send + Sync + 'static,
{
    inner: Arc<Inner<S>>,
    sequence: TaskId,
    status: Arc<StatusCell>,
    settlement: Option<Settlement>,
}

impl<S> Drop for Slot<S>
where
    S: Spawn + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let settlement = self.settlement.take().unwrap_or_else(|| {
            self.status.set(TaskState::Rejected);
            Settlement::Rejected(SchedulerError::Dropped(self.sequence).to_string())
        });
        Scheduler {
            inner: Arc::clone(&self.inner),
        }
        .finish(self.sequence, &settlement);
    }
}

/// Scheduler with a fixed concurrency limit and FIFO admission.
///
/// Cloning is cheap and yields another handle to the same scheduler. Running tasks
/// keep the scheduler alive until the queue drains; if every clone is dropped while
/// tasks are still pending and nothing is running, those tasks settle with
/// [`SchedulerError::Dropped`].
///
/// ```rust,ignore
/// let scheduler = Scheduler::new(2)?;
/// let handles = scheduler.submit_batch(urls.into_iter().map(|url| move || fetch(url)));
/// let outcome = settle_all(handles).await;
/// ```
#[cfg(feature = "tokio-runtime")]
pub struct Scheduler<S = crate::runtime::TokioSpawner> {
    inner: Arc<Inner<S>>,
}

/// Scheduler with a fixed concurrency limit and FIFO admission.
///
/// Cloning is cheap and yields another handle to the same scheduler.
#[cfg(not(feature = "tokio-runtime"))]
pub struct Scheduler<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl Scheduler<crate::runtime::TokioSpawner> {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Configuration` if `concurrency_limit` is 0
    /// - `SchedulerError::Runtime` if called outside a tokio runtime
    pub fn new(concurrency_limit: usize) -> Result<Self, SchedulerError> {
        Self::from_config(&SchedulerConfig::new(concurrency_limit))
    }

    /// Create a scheduler from configuration on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Configuration` if the configuration is invalid
    /// - `SchedulerError::Runtime` if called outside a tokio runtime
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let spawner = crate::runtime::TokioSpawner::current()?;
        Ok(Self::assemble(config, spawner, None))
    }
}

impl<S> Scheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    /// Create a scheduler that runs tasks through `spawner`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Configuration` if `concurrency_limit` is 0.
    pub fn with_spawner(concurrency_limit: usize, spawner: S) -> Result<Self, SchedulerError> {
        Self::with_config(&SchedulerConfig::new(concurrency_limit), spawner, None)
    }

    pub(crate) fn with_config(
        config: &SchedulerConfig,
        spawner: S,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::assemble(config, spawner, events))
    }

    /// Build from a configuration that has already been validated.
    pub(crate) fn assemble(
        config: &SchedulerConfig,
        spawner: S,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let core = Core {
            id: Uuid::new_v4(),
            name: config.name.clone(),
            limit: config.concurrency_limit,
            state: Mutex::new(SchedulerState::default()),
            events,
        };
        tracing::info!(
            scheduler = %core.name,
            id = %core.id,
            concurrency_limit = core.limit,
            "scheduler created"
        );

        Self {
            inner: Arc::new(Inner {
                core: Arc::new(core),
                spawner,
            }),
        }
    }

    /// Submit one task. Returns immediately; the task starts as soon as a slot is
    /// free and every earlier pending task has started.
    pub fn submit<T, O>(&self, op: O) -> TaskHandle<T>
    where
        T: Send + 'static,
        O: Operation<T>,
    {
        let (job, rx) = Job::new(op);
        let status = StatusCell::pending();
        let core = &self.inner.core;
        let sequence = {
            let mut state = core.state.lock();
            core.enqueue(&mut state, Box::new(job), Arc::clone(&status))
        };
        tracing::debug!(scheduler = %core.name, sequence, "task submitted");

        self.pump();
        TaskHandle::new(sequence, status, rx, Arc::downgrade(core))
    }

    /// Submit tasks atomically: no other submission interleaves with the batch, and
    /// the tasks keep their relative order. Returns one handle per task, in order.
    pub fn submit_batch<T, O, I>(&self, ops: I) -> Vec<TaskHandle<T>>
    where
        T: Send + 'static,
        O: Operation<T>,
        I: IntoIterator<Item = O>,
    {
        // Build everything outside the lock; iterating may run caller code.
        let prepared: Vec<_> = ops
            .into_iter()
            .map(|op| {
                let (job, rx) = Job::new(op);
                (Box::new(job) as Box<dyn Dispatch>, rx, StatusCell::pending())
            })
            .collect();
        if prepared.is_empty() {
            return Vec::new();
        }

        let core = &self.inner.core;
        let mut handles = Vec::with_capacity(prepared.len());
        {
            let mut state = core.state.lock();
            for (dispatch, rx, status) in prepared {
                let sequence = core.enqueue(&mut state, dispatch, Arc::clone(&status));
                handles.push(TaskHandle::new(sequence, status, rx, Arc::downgrade(core)));
            }
            tracing::debug!(
                scheduler = %core.name,
                count = handles.len(),
                pending = state.queue.len(),
                running = state.running,
                "batch submitted"
            );
        }

        self.pump();
        handles
    }

    /// Submit `payload` to a reusable executor.
    pub fn submit_payload<P, T, E>(&self, executor: &E, payload: P) -> TaskHandle<T>
    where
        P: Send + 'static,
        T: Send + 'static,
        E: TaskExecutor<P, T>,
    {
        self.submit(bind(executor.clone(), payload))
    }

    /// Submit each payload to a reusable executor as one atomic batch.
    pub fn submit_payloads<P, T, E, I>(&self, executor: &E, payloads: I) -> Vec<TaskHandle<T>>
    where
        P: Send + 'static,
        T: Send + 'static,
        E: TaskExecutor<P, T>,
        I: IntoIterator<Item = P>,
    {
        self.submit_batch(
            payloads
                .into_iter()
                .map(|payload| bind(executor.clone(), payload)),
        )
    }

    /// Admission loop. Runs until no slot is free or nothing is pending.
    fn pump(&self) {
        let core = &self.inner.core;
        {
            let mut state = core.state.lock();
            if state.pumping {
                return;
            }
            state.pumping = true;
        }
        let mut guard = PumpGuard {
            core,
            finished: false,
        };

        loop {
            let record = {
                let mut state = core.state.lock();
                match core.try_admit(&mut state) {
                    Some(record) => record,
                    None => {
                        state.pumping = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            self.launch(record);
        }
    }

    /// Invoke a freshly admitted task and spawn the future that settles it.
    fn launch(&self, record: TaskRecord) {
        let TaskRecord {
            sequence,
            status,
            dispatch,
        } = record;
        tracing::debug!(scheduler = %self.inner.core.name, sequence, "task started");

        let settle = dispatch.launch(sequence, Arc::clone(&status));
        let mut slot = Slot {
            inner: Arc::clone(&self.inner),
            sequence,
            status,
            settlement: None,
        };
        self.inner.spawner.spawn(async move {
            slot.settlement = Some(settle.await);
        });
    }

    /// Release the slot of a settled task and admit the next one.
    fn finish(&self, sequence: TaskId, settlement: &Settlement) {
        let core = &self.inner.core;
        match settlement {
            Settlement::Fulfilled => {
                tracing::debug!(scheduler = %core.name, sequence, "task fulfilled");
            }
            Settlement::Rejected(reason) => {
                tracing::warn!(scheduler = %core.name, sequence, reason = %reason, "task rejected");
            }
        }

        {
            let mut state = core.state.lock();
            state.running -= 1;
            let transition = match settlement {
                Settlement::Fulfilled => {
                    state.fulfilled += 1;
                    Transition::Fulfilled
                }
                Settlement::Rejected(_) => {
                    state.rejected += 1;
                    Transition::Rejected
                }
            };
            core.emit(&state, sequence, transition);
        }

        self.pump();
    }
}

impl<S> Scheduler<S> {
    /// Maximum simultaneously running tasks.
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.inner.core.limit
    }

    /// Name from the scheduler's configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.core.name
    }

    /// Instance identifier carried in lifecycle events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.core.id
    }

    /// Tasks currently occupying a slot.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner.core.state.lock().running
    }

    /// Tasks waiting for a slot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.core.state.lock().queue.len()
    }

    /// Snapshot of current utilization and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let core = &self.inner.core;
        let state = core.state.lock();
        SchedulerStats {
            name: core.name.clone(),
            concurrency_limit: core.limit,
            running: state.running,
            pending: state.queue.len(),
            submitted: state.submitted,
            fulfilled: state.fulfilled,
            rejected: state.rejected,
            cancelled: state.cancelled,
        }
    }
}

impl<S> std::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("concurrency_limit", &self.concurrency_limit())
            .finish_non_exhaustive()
    }
}
