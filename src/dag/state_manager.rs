// src/dag/state_manager.rs

//! Per-task run state shared across every lane.
//!
//! Each task owns its own atomics (status + remaining-dependency counter), so
//! unrelated completions never contend on a common lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use tracing::warn;

use crate::dag::DagGraph;
use crate::types::{TaskId, TaskStatus};

#[derive(Debug)]
struct TaskNode {
    status: AtomicU8,
    /// Prerequisites that have not yet finalized.
    remaining: AtomicUsize,
    /// Set when a prerequisite timed out and this task does not tolerate it.
    blocked: AtomicBool,
}

/// Status and remaining-dependency counters for every registered task.
///
/// The key set is fixed at construction; only the atomics inside change.
#[derive(Debug)]
pub struct TaskStates {
    nodes: HashMap<TaskId, TaskNode>,
}

impl TaskStates {
    /// All tasks start `Pending`, with `remaining` equal to their number of
    /// declared prerequisites.
    pub fn new(graph: &DagGraph) -> Self {
        let nodes = graph
            .tasks()
            .map(|id| {
                let node = TaskNode {
                    status: AtomicU8::new(TaskStatus::Pending as u8),
                    remaining: AtomicUsize::new(graph.dependencies_of(id).len()),
                    blocked: AtomicBool::new(false),
                };
                (id.to_string(), node)
            })
            .collect();
        Self { nodes }
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        let node = self.nodes.get(id)?;
        Some(TaskStatus::from_u8(node.status.load(Ordering::Acquire)))
    }

    pub fn remaining(&self, id: &str) -> Option<usize> {
        let node = self.nodes.get(id)?;
        Some(node.remaining.load(Ordering::Acquire))
    }

    /// Atomically move `id` from `Pending` to `Running`.
    ///
    /// Returns `false` if the task is unknown or was already started, which
    /// makes a duplicate release a no-op.
    pub fn try_begin(&self, id: &str) -> bool {
        self.transition(id, TaskStatus::Pending, TaskStatus::Running)
    }

    /// Atomically move `id` from `Running` to a terminal `outcome`.
    ///
    /// This is the finalize-once guard: of several racing callers (normal
    /// completion, deadline expiry) exactly one gets `true`.
    pub fn try_finalize(&self, id: &str, outcome: TaskStatus) -> bool {
        debug_assert!(outcome.is_terminal());
        self.transition(id, TaskStatus::Running, outcome)
    }

    /// Decrement the remaining-dependency counter of `id`.
    ///
    /// Returns the count left after the decrement. Exactly one caller
    /// observes `Some(0)`. Returns `None` for an unknown task or when the
    /// counter is already zero.
    pub fn release_one(&self, id: &str) -> Option<usize> {
        let node = self.nodes.get(id)?;
        match node
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => Some(previous - 1),
            Err(_) => {
                warn!(task = %id, "remaining-dependency counter already at zero");
                None
            }
        }
    }

    /// Mark `id` as never to be released, whatever its counter says.
    pub fn block(&self, id: &str) {
        if let Some(node) = self.nodes.get(id) {
            node.blocked.store(true, Ordering::Release);
        }
    }

    pub fn is_blocked(&self, id: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.blocked.load(Ordering::Acquire))
    }

    /// Point-in-time copy of every status, sorted by task id.
    pub fn snapshot(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.nodes
            .iter()
            .map(|(id, node)| {
                (
                    id.clone(),
                    TaskStatus::from_u8(node.status.load(Ordering::Acquire)),
                )
            })
            .collect()
    }

    fn transition(&self, id: &str, from: TaskStatus, to: TaskStatus) -> bool {
        match self.nodes.get(id) {
            Some(node) => node
                .status
                .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::dag::TaskDescriptor;

    fn states() -> TaskStates {
        let graph = DagGraph::build(&[
            TaskDescriptor::new("A", || Ok(())),
            TaskDescriptor::new("B", || Ok(())),
            TaskDescriptor::new("C", || Ok(())).depends_on_all(["A", "B"]),
        ])
        .unwrap();
        TaskStates::new(&graph)
    }

    #[test]
    fn counters_start_at_dependency_count() {
        let s = states();
        assert_eq!(s.remaining("A"), Some(0));
        assert_eq!(s.remaining("C"), Some(2));
        assert_eq!(s.status("C"), Some(TaskStatus::Pending));
        assert_eq!(s.status("missing"), None);
    }

    #[test]
    fn begin_only_succeeds_once() {
        let s = states();
        assert!(s.try_begin("A"));
        assert!(!s.try_begin("A"));
        assert_eq!(s.status("A"), Some(TaskStatus::Running));
    }

    #[test]
    fn finalize_requires_running_and_wins_once() {
        let s = states();
        assert!(!s.try_finalize("A", TaskStatus::Succeeded));
        assert!(s.try_begin("A"));
        assert!(s.try_finalize("A", TaskStatus::TimedOut));
        assert!(!s.try_finalize("A", TaskStatus::Succeeded));
        assert_eq!(s.status("A"), Some(TaskStatus::TimedOut));
    }

    #[test]
    fn release_never_goes_below_zero() {
        let s = states();
        assert_eq!(s.release_one("C"), Some(1));
        assert_eq!(s.release_one("C"), Some(0));
        assert_eq!(s.release_one("C"), None);
    }

    #[test]
    fn block_is_sticky() {
        let s = states();
        assert!(!s.is_blocked("C"));
        s.block("C");
        assert!(s.is_blocked("C"));
        assert!(!s.is_blocked("missing"));
    }

    #[test]
    fn racing_finalizers_have_a_single_winner() {
        for _ in 0..200 {
            let s = Arc::new(states());
            assert!(s.try_begin("A"));

            let handles: Vec<_> = [TaskStatus::Succeeded, TaskStatus::TimedOut]
                .into_iter()
                .map(|outcome| {
                    let s = Arc::clone(&s);
                    thread::spawn(move || s.try_finalize("A", outcome))
                })
                .collect();
            let wins = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(wins, 1);
        }
    }

    #[test]
    fn racing_releases_observe_zero_exactly_once() {
        for _ in 0..200 {
            let s = Arc::new(states());
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let s = Arc::clone(&s);
                    thread::spawn(move || s.release_one("C"))
                })
                .collect();
            let zeros = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|left| *left == Some(0))
                .count();
            assert_eq!(zeros, 1);
        }
    }
}
