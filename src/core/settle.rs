//! Aggregation over task handles.
//!
//! The scheduler never aggregates on its own; these helpers compose handles the
//! two ways callers usually need: wait for everything and partition the outcomes,
//! or stop at the first failure.

use futures::future::{join_all, try_join_all};

use crate::core::{SchedulerError, TaskHandle};
use crate::util::serde::TaskId;

/// Outcomes of a set of tasks, partitioned by success.
#[derive(Debug)]
pub struct Settled<T> {
    /// Successful results with their sequence numbers, in handle order.
    pub fulfilled: Vec<(TaskId, T)>,
    /// Failures with their sequence numbers, in handle order.
    pub rejected: Vec<(TaskId, SchedulerError)>,
}

impl<T> Settled<T> {
    /// Whether every task succeeded.
    #[must_use]
    pub fn all_fulfilled(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Total number of settled tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fulfilled.len() + self.rejected.len()
    }

    /// Whether no tasks were settled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successful values only, discarding sequence numbers.
    #[must_use]
    pub fn into_values(self) -> Vec<T> {
        self.fulfilled.into_iter().map(|(_, value)| value).collect()
    }
}

/// Wait for every handle and partition the outcomes. Individual failures never
/// cut the wait short.
pub async fn settle_all<T, I>(handles: I) -> Settled<T>
where
    I: IntoIterator<Item = TaskHandle<T>>,
{
    let handles: Vec<_> = handles.into_iter().collect();
    let sequences: Vec<TaskId> = handles.iter().map(TaskHandle::sequence).collect();
    let outcomes = join_all(handles).await;

    let mut settled = Settled {
        fulfilled: Vec::new(),
        rejected: Vec::new(),
    };
    for (sequence, outcome) in sequences.into_iter().zip(outcomes) {
        match outcome {
            Ok(value) => settled.fulfilled.push((sequence, value)),
            Err(err) => settled.rejected.push((sequence, err)),
        }
    }
    settled
}

/// Wait for every handle, returning the values in handle order, or the first
/// failure as soon as it is observed.
///
/// Remaining tasks are not cancelled; they keep running and their outcomes are
/// discarded.
///
/// # Errors
///
/// Returns the first [`SchedulerError`] produced by any handle.
pub async fn try_settle_all<T, I>(handles: I) -> Result<Vec<T>, SchedulerError>
where
    I: IntoIterator<Item = TaskHandle<T>>,
{
    try_join_all(handles).await
}
