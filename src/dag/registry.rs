// src/dag/registry.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::CascadeStep;
use crate::dag::state_manager::TaskStates;
use crate::dag::task_info::TaskDescriptor;
use crate::errors::{BootdagError, Result};
use crate::types::{TaskId, TaskStatus};

/// The registered task set: immutable graph and descriptors plus the shared
/// per-task state.
///
/// It is responsible for:
/// - validating the task set (unknown ids, duplicates, cycles)
/// - the dispatch guard (`Pending -> Running` once)
/// - the finalize-once guard
/// - the completion cascade: decrementing dependents and deciding which of
///   them are released
#[derive(Debug)]
pub struct TaskRegistry {
    graph: DagGraph,
    tasks: HashMap<TaskId, TaskDescriptor>,
    states: TaskStates,
}

impl TaskRegistry {
    /// Validate `tasks` and build the registry.
    ///
    /// Nothing is retained when this fails.
    pub fn build(tasks: Vec<TaskDescriptor>) -> Result<Self> {
        let graph = DagGraph::build(&tasks)?;

        if let Some(cycle) = graph.find_cycle() {
            warn!(cycle = ?cycle, "circular dependency in task set");
            return Err(BootdagError::CircularDependency(cycle));
        }

        let states = TaskStates::new(&graph);
        let tasks = tasks
            .into_iter()
            .map(|task| (task.id().to_string(), task))
            .collect();

        Ok(Self {
            graph,
            tasks,
            states,
        })
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn states(&self) -> &TaskStates {
        &self.states
    }

    pub fn descriptor(&self, id: &str) -> Option<&TaskDescriptor> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    pub fn entry_tasks(&self) -> Vec<TaskId> {
        self.graph.entry_tasks()
    }

    /// Propagate the finalization of `task` (with `outcome`) to its
    /// dependents.
    ///
    /// Every dependent's counter is decremented. A dependent whose counter
    /// reaches zero is released, unless any of its prerequisites timed out
    /// and it does not allow continuing after a timeout; then it is
    /// suppressed and stays `Pending`. A `Failed` outcome never gates.
    pub fn cascade(&self, task: &str, outcome: TaskStatus) -> CascadeStep {
        let mut step = CascadeStep::default();

        for dependent in self.graph.dependents_of(task) {
            let tolerates_timeout = self
                .tasks
                .get(dependent)
                .map(TaskDescriptor::allows_continue_on_timeout)
                .unwrap_or(false);

            // Block before decrementing so whoever observes zero also sees it.
            if outcome == TaskStatus::TimedOut && !tolerates_timeout {
                self.states.block(dependent);
            }

            let Some(left) = self.states.release_one(dependent) else {
                continue;
            };

            debug!(task = %task, dependent = %dependent, left, "dependency finalized");
            if left > 0 {
                continue;
            }

            if self.states.is_blocked(dependent) {
                warn!(
                    task = %task,
                    dependent = %dependent,
                    "a prerequisite timed out and dependent does not allow continuing; it will stay pending"
                );
                step.suppressed.push(dependent.clone());
            } else {
                info!(
                    task = %task,
                    dependent = %dependent,
                    upstream = %outcome,
                    "all prerequisites finalized; releasing dependent"
                );
                step.released.push(dependent.clone());
            }
        }

        step
    }
}
