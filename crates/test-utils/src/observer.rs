use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bootdag::{TaskCompletion, TaskObserver, TimingRecord};

/// Observer that keeps every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    completions: Mutex<Vec<TaskCompletion>>,
    all_complete_calls: AtomicUsize,
    timeline: Mutex<Vec<TimingRecord>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> Vec<TaskCompletion> {
        self.completions.lock().unwrap().clone()
    }

    /// Task ids in the order their completions were delivered.
    pub fn completed_ids(&self) -> Vec<String> {
        self.completions()
            .into_iter()
            .map(|c| c.task_id)
            .collect()
    }

    pub fn completion(&self, task: &str) -> Option<TaskCompletion> {
        self.completions().into_iter().find(|c| c.task_id == task)
    }

    pub fn all_complete_calls(&self) -> usize {
        self.all_complete_calls.load(Ordering::SeqCst)
    }

    /// Timeline delivered with the all-complete event.
    pub fn final_timeline(&self) -> Vec<TimingRecord> {
        self.timeline.lock().unwrap().clone()
    }
}

impl TaskObserver for RecordingObserver {
    fn on_task_complete(&self, completion: &TaskCompletion) {
        self.completions.lock().unwrap().push(completion.clone());
    }

    fn on_all_complete(&self, timeline: &[TimingRecord]) {
        self.all_complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.timeline.lock().unwrap() = timeline.to_vec();
    }
}
