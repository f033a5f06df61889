// src/engine/cascade.rs

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::types::TaskId;

/// Tracks which registered tasks have not finalized yet and detects the
/// moment the last one does.
#[derive(Debug)]
pub struct CompletionTracker {
    outstanding: Mutex<HashSet<TaskId>>,
    drained: AtomicBool,
}

impl CompletionTracker {
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = TaskId>,
    {
        Self {
            outstanding: Mutex::new(tasks.into_iter().collect()),
            drained: AtomicBool::new(false),
        }
    }

    /// Record that `task` finalized.
    ///
    /// Returns `true` exactly once: for the call that empties the set (or,
    /// with no tasks at all, the first call to [`Self::drain_if_empty`]).
    pub fn mark_finalized(&self, task: &str) -> bool {
        let mut outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !outstanding.remove(task) {
            debug!(task = %task, "task already marked finalized");
            return false;
        }
        outstanding.is_empty() && !self.drained.swap(true, Ordering::AcqRel)
    }

    /// For empty task sets, which never see a finalization.
    pub fn drain_if_empty(&self) -> bool {
        let outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        outstanding.is_empty() && !self.drained.swap(true, Ordering::AcqRel)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn last_finalization_drains() {
        let tracker = CompletionTracker::new(["A".to_string(), "B".to_string()]);
        assert!(!tracker.mark_finalized("A"));
        assert!(!tracker.mark_finalized("A"));
        assert_eq!(tracker.outstanding(), 1);
        assert!(tracker.mark_finalized("B"));
        assert!(tracker.is_drained());
        assert!(!tracker.mark_finalized("B"));
    }

    #[test]
    fn empty_set_drains_once() {
        let tracker = CompletionTracker::new(Vec::new());
        assert!(tracker.drain_if_empty());
        assert!(!tracker.drain_if_empty());
    }

    #[test]
    fn concurrent_finalizations_drain_exactly_once() {
        let ids: Vec<TaskId> = (0..64).map(|i| format!("T{i}")).collect();
        let tracker = Arc::new(CompletionTracker::new(ids.clone()));
        let drained = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let tracker = Arc::clone(&tracker);
                let drained = Arc::clone(&drained);
                std::thread::spawn(move || {
                    if tracker.mark_finalized(&id) {
                        drained.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(drained.load(Ordering::SeqCst), 1);
    }
}
