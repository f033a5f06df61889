// src/types.rs

use std::fmt;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Lifecycle status of a single task.
///
/// A task moves `Pending -> Running` exactly once (when dispatched), and then
/// `Running -> {Succeeded, Failed, TimedOut}` exactly once (when finalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskStatus {
    Pending = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
    TimedOut = 4,
}

impl TaskStatus {
    /// Whether this status is one of the three finalized outcomes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Succeeded,
            3 => TaskStatus::Failed,
            _ => TaskStatus::TimedOut,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

/// Which execution context a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// The single serial "main" lane (FIFO, one task at a time).
    Main,
    /// Any slot of the bounded worker pool.
    Worker,
}

/// Scheduler lifecycle.
///
/// `Unregistered -> Registered -> Running -> Draining -> Shutdown`.
/// `shutdown()` may also be called from `Unregistered` or `Registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerPhase {
    Unregistered = 0,
    Registered = 1,
    Running = 2,
    Draining = 3,
    Shutdown = 4,
}

impl SchedulerPhase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SchedulerPhase::Unregistered,
            1 => SchedulerPhase::Registered,
            2 => SchedulerPhase::Running,
            3 => SchedulerPhase::Draining,
            _ => SchedulerPhase::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_u8() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::TimedOut,
        ] {
            assert_eq!(TaskStatus::from_u8(status as u8), status);
        }
    }

    #[test]
    fn only_finalized_statuses_are_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
    }
}
