//! Lifecycle event sinks.
//!
//! Every state transition is recorded while the scheduler's state lock is held, so
//! the stream a sink receives is a faithful trace of admission order and slot usage.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::serde::TaskId;

/// Transition recorded for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Appended to the pending queue.
    Submitted,
    /// Admitted into a slot.
    Started,
    /// Settled with a value; its slot has been released.
    Fulfilled,
    /// Settled with an error; its slot has been released.
    Rejected,
    /// Removed from the queue before starting.
    Cancelled,
}

/// Lifecycle event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Scheduler instance identifier.
    pub scheduler: Uuid,
    /// Task sequence number.
    pub sequence: TaskId,
    /// Transition taken.
    pub transition: Transition,
    /// Running tasks immediately after the transition.
    pub running: usize,
    /// Pending tasks immediately after the transition.
    pub pending: usize,
    /// Timestamp milliseconds.
    pub recorded_at_ms: u128,
}

/// Event sink abstraction.
///
/// `record` is called with the scheduler's state lock held; implementations must
/// not call back into the scheduler. A panic inside `record` loses that event
/// and nothing else.
pub trait EventSink: Send + Sync {
    /// Record a lifecycle event.
    fn record(&self, event: LifecycleEvent);
}

/// In-memory event sink for testing and dev.
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<LifecycleEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Sequence numbers that took `transition`, in the order they were recorded.
    #[must_use]
    pub fn sequences(&self, transition: Transition) -> Vec<TaskId> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.transition == transition)
            .map(|e| e.sequence)
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: LifecycleEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: LifecycleEvent) {
        tracing::trace!(
            scheduler = %event.scheduler,
            sequence = event.sequence,
            transition = ?event.transition,
            running = event.running,
            pending = event.pending,
            "task transition"
        );
    }
}

/// Helper to build a lifecycle event stamped with the current time.
#[must_use]
pub fn build_event(
    scheduler: Uuid,
    sequence: TaskId,
    transition: Transition,
    running: usize,
    pending: usize,
) -> LifecycleEvent {
    LifecycleEvent {
        scheduler,
        sequence,
        transition,
        running,
        pending,
        recorded_at_ms: now_ms(),
    }
}
