//! # Prometheus Bounded Scheduler
//!
//! A concurrency-bounded FIFO task scheduler for async workloads.
//!
//! Tasks are zero-argument async operations. The scheduler runs at most
//! `concurrency_limit` of them at once, starts them strictly in submission order,
//! and reports each task's outcome on its own handle, so one failure never stops
//! the queue or touches sibling tasks.
//!
//! ## Modes
//!
//! - **Queue mode**: `concurrency_limit = 1` gives strict sequential FIFO execution.
//! - **Limited parallelism**: `concurrency_limit = N` runs batches with at most N
//!   tasks in flight.
//!
//! Both are the same primitive; only the limit differs.
//!
//! ## Key Features
//!
//! - **Self-driving admission**: every submission and completion admits the next
//!   pending tasks; no polling loop.
//! - **Failure isolation**: errors and panics, including panics raised while the
//!   operation is being invoked, settle only the failing task's handle.
//! - **Atomic batches**: `submit_batch` enqueues a whole batch without interleaving.
//! - **Cancellation** of tasks that have not started yet.
//! - **Lifecycle events** for tracing admission order and slot usage.
//! - **Composable aggregation**: settle-all, fail-fast, and per-task timeouts are
//!   built by composing handles.
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_bounded_scheduler::core::{settle_all, Scheduler};
//!
//! let scheduler = Scheduler::new(2)?;
//! let handles = scheduler.submit_batch((0..4).map(|i| move || async move {
//!     tokio::time::sleep(std::time::Duration::from_millis(10 * i)).await;
//!     Ok::<_, anyhow::Error>(i)
//! }));
//!
//! let outcome = settle_all(handles).await;
//! assert!(outcome.all_fulfilled());
//! ```
//!
//! For complete examples, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and slot accounting.
pub mod core;
/// Configuration models for schedulers.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters and handle composition that needs a runtime.
pub mod runtime;
/// Shared utilities.
pub mod util;
