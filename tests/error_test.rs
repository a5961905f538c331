//! Tests for error types.

use std::time::Duration;

use prometheus_bounded_scheduler::core::{SchedulerError, TaskError};

#[test]
fn test_configuration_error() {
    let err = SchedulerError::Configuration("limit".to_string());
    assert_eq!(format!("{err}"), "invalid configuration: limit");
    assert_eq!(err.sequence(), None);
}

#[test]
fn test_cancelled_error() {
    let err = SchedulerError::Cancelled(4);
    assert_eq!(format!("{err}"), "task 4 cancelled before it started");
}

#[test]
fn test_dropped_error() {
    let err = SchedulerError::Dropped(2);
    assert_eq!(format!("{err}"), "task 2 dropped before it settled");
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::Timeout {
        sequence: 1,
        after: Duration::from_millis(250),
    };
    assert_eq!(format!("{err}"), "task 1 did not settle within 250ms");
}

#[test]
fn test_task_error_is_transparent() {
    let err = SchedulerError::from(TaskError::Panicked {
        sequence: 6,
        message: "boom".into(),
    });
    assert_eq!(format!("{err}"), "task 6 panicked: boom");
    assert_eq!(err.sequence(), Some(6));
}

#[test]
fn test_runtime_error() {
    let err = SchedulerError::Runtime("no reactor".into());
    assert_eq!(format!("{err}"), "runtime unavailable: no reactor");
}
