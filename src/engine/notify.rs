// src/engine/notify.rs

//! Completion notifications.
//!
//! Observers subscribe to a [`NotificationHub`] and receive one
//! [`TaskCompletion`] per finalized task, then a single all-complete event
//! carrying the timeline. Delivery is serialized so an observer never sees
//! two callbacks at once, and a panicking observer is logged and skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, error, warn};

use crate::engine::timing::TimingRecord;
use crate::types::{TaskId, TaskStatus};

/// Everything known about a task once it has finalized.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub record: TimingRecord,
    /// Failure or timeout reason; `None` on success.
    pub error: Option<String>,
}

/// Receives completion events.
///
/// Callbacks run on whichever lane finalized the task (a worker thread, the
/// main lane, or the timer thread for timeouts), so keep them short.
pub trait TaskObserver: Send + Sync {
    fn on_task_complete(&self, completion: &TaskCompletion) {
        if completion.status != TaskStatus::Succeeded {
            warn!(
                task = %completion.task_id,
                status = %completion.status,
                error = completion.error.as_deref().unwrap_or(""),
                "task did not succeed"
            );
        }
    }

    /// Called once, after every registered task has finalized.
    fn on_all_complete(&self, timeline: &[TimingRecord]);
}

#[derive(Default)]
pub struct NotificationHub {
    observers: RwLock<Vec<Arc<dyn TaskObserver>>>,
    delivery: Mutex<()>,
    all_complete_sent: AtomicBool,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        if self.all_complete_sent.load(Ordering::Acquire) {
            debug!("observer subscribed after all-complete; it will receive nothing");
        }
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn all_complete_sent(&self) -> bool {
        self.all_complete_sent.load(Ordering::Acquire)
    }

    pub fn publish_task_complete(&self, completion: &TaskCompletion) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        for observer in self.current_observers() {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_task_complete(completion)));
            if outcome.is_err() {
                error!(task = %completion.task_id, "observer panicked in on_task_complete");
            }
        }
    }

    /// Deliver the all-complete event. Only the first call has any effect;
    /// observers are released afterwards.
    pub fn publish_all_complete(&self, timeline: &[TimingRecord]) -> bool {
        if self.all_complete_sent.swap(true, Ordering::AcqRel) {
            debug!("all-complete already published; ignoring");
            return false;
        }

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let observers = std::mem::take(
            &mut *self
                .observers
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for observer in observers {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_all_complete(timeline)));
            if outcome.is_err() {
                error!("observer panicked in on_all_complete");
            }
        }
        true
    }

    fn current_observers(&self) -> Vec<Arc<dyn TaskObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("observers", &self.observer_count())
            .field("all_complete_sent", &self.all_complete_sent())
            .finish()
    }
}
