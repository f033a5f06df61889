// src/engine/timing.rs

//! Per-task timing records and the end-of-run performance report.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::types::TaskId;

/// When and where a task ran.
///
/// Recorded for every task that reaches a terminal status, including failed
/// and timed-out ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord {
    pub task_id: TaskId,
    pub start: Instant,
    pub end: Instant,
    /// Name of the thread (or serial lane) that ran the task.
    pub lane: String,
}

impl TimingRecord {
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Thread-safe store of [`TimingRecord`]s, at most one per task.
#[derive(Debug, Default)]
pub struct TimingRecorder {
    records: Mutex<HashMap<TaskId, TimingRecord>>,
}

impl TimingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record`, replacing any earlier record for the same task.
    pub fn record(&self, record: TimingRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.task_id.clone(), record);
    }

    pub fn get(&self, task: &str) -> Option<TimingRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, ordered by task id.
    pub fn records(&self) -> Vec<TimingRecord> {
        let mut all = self.snapshot();
        all.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        all
    }

    /// All records, ordered by start time (ties broken by task id).
    pub fn timeline(&self) -> Vec<TimingRecord> {
        let mut all = self.snapshot();
        all.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));
        all
    }

    /// Earliest start to latest end, or `None` before anything finished.
    pub fn total_span(&self) -> Option<Duration> {
        total_span_of(&self.snapshot())
    }

    fn snapshot(&self) -> Vec<TimingRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

fn total_span_of(records: &[TimingRecord]) -> Option<Duration> {
    let first = records.iter().map(|r| r.start).min()?;
    let last = records.iter().map(|r| r.end).max()?;
    Some(last.saturating_duration_since(first))
}

/// Render a human-readable report of `timeline`, offsets relative to the
/// earliest start.
pub fn render_report(timeline: &[TimingRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "===== Startup Task Performance Report =====");

    let Some(origin) = timeline.iter().map(|r| r.start).min() else {
        let _ = writeln!(out, "No tasks were recorded.");
        return out;
    };

    let total = total_span_of(timeline).unwrap_or_default();
    let _ = writeln!(out, "Total duration: {}ms", total.as_millis());

    for record in timeline {
        let offset = record.start.saturating_duration_since(origin);
        let _ = writeln!(
            out,
            "Task: {:<24} | Lane: {:<20} | Start: +{:>6}ms | Duration: {:>6}ms",
            record.task_id,
            record.lane,
            offset.as_millis(),
            record.duration().as_millis(),
        );
    }
    out
}
