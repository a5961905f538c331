//! Core scheduling abstractions and slot accounting.

pub mod error;
pub mod events;
pub mod executor;
pub mod handle;
pub mod scheduler;
pub mod settle;
pub mod task;

pub use error::{AppResult, BoxError, SchedulerError, TaskError};
pub use events::{
    build_event, EventSink, InMemoryEventSink, LifecycleEvent, TracingEventSink, Transition,
};
pub use executor::{bind, TaskExecutor};
pub use handle::TaskHandle;
pub use scheduler::{Scheduler, SchedulerStats, Spawn};
pub use settle::{settle_all, try_settle_all, Settled};
pub use task::Operation;
