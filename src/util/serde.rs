//! Serializable identifiers and task lifecycle states shared across modules.

use serde::{Deserialize, Serialize};

/// Per-scheduler task sequence number, assigned in submission order starting at 0.
pub type TaskId = u64;

/// Lifecycle state of a submitted task.
///
/// Transitions happen at most once each: `Pending -> Running -> Fulfilled | Rejected`,
/// or `Pending -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Queued, waiting for a free slot.
    Pending = 0,
    /// Occupying a slot.
    Running = 1,
    /// Finished with a value.
    Fulfilled = 2,
    /// Finished with an error or a panic.
    Rejected = 3,
    /// Removed from the queue before it started.
    Cancelled = 4,
}

impl TaskState {
    /// Whether the task has reached a terminal state.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Rejected | Self::Cancelled)
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Fulfilled,
            3 => Self::Rejected,
            _ => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            TaskState::Pending,
            TaskState::Running,
            TaskState::Fulfilled,
            TaskState::Rejected,
            TaskState::Cancelled,
        ] {
            assert_eq!(TaskState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_settled_states() {
        assert!(!TaskState::Pending.is_settled());
        assert!(!TaskState::Running.is_settled());
        assert!(TaskState::Fulfilled.is_settled());
        assert!(TaskState::Rejected.is_settled());
        assert!(TaskState::Cancelled.is_settled());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&TaskState::Fulfilled).unwrap();
        assert_eq!(json, "\"fulfilled\"");
    }
}
