// src/dag/scheduler_step.rs

//! Result type of a single cascade step.

use crate::types::TaskId;

/// Structured result of propagating one finalized task to its dependents.
///
/// Useful for tests that want to step the DAG by hand and assert on what
/// changed, without any lanes involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeStep {
    /// Dependents whose counter reached zero and that must now be dispatched.
    pub released: Vec<TaskId>,
    /// Dependents whose counter reached zero but that are held back because
    /// the finalized task timed out and they do not tolerate that. They stay
    /// `Pending` for good.
    pub suppressed: Vec<TaskId>,
}

impl CascadeStep {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.suppressed.is_empty()
    }
}
