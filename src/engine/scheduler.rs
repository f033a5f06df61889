// src/engine/scheduler.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::dag::TaskDescriptor;
use crate::engine::core::SchedulerCore;
use crate::engine::notify::TaskObserver;
use crate::engine::timing::TimingRecord;
use crate::errors::Result;
use crate::exec::SerialLane;
use crate::types::{SchedulerPhase, TaskId, TaskStatus};

/// One-shot startup task scheduler.
///
/// ```no_run
/// use bootdag::{Scheduler, SchedulerConfig, TaskDescriptor};
///
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// scheduler.register([
///     TaskDescriptor::new("StorageInit", || Ok(())),
///     TaskDescriptor::new("ConfigLoad", || Ok(()))
///         .on_main_lane()
///         .depends_on("StorageInit"),
/// ])?;
/// scheduler.start()?;
/// scheduler.wait_for_all_complete(std::time::Duration::from_secs(30));
/// # Ok::<(), bootdag::errors::BootdagError>(())
/// ```
///
/// Dropping the scheduler shuts it down.
#[derive(Debug)]
pub struct Scheduler {
    core: Arc<SchedulerCore>,
}

impl Scheduler {
    /// Create a scheduler with its own worker pool and main lane thread.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Ok(Self {
            core: Arc::new(SchedulerCore::new(config, None)?),
        })
    }

    /// Create a scheduler whose main-lane tasks are posted to `lane`, e.g.
    /// an application's own event loop.
    pub fn with_main_lane(config: SchedulerConfig, lane: Arc<dyn SerialLane>) -> Result<Self> {
        Ok(Self {
            core: Arc::new(SchedulerCore::new(config, Some(lane))?),
        })
    }

    /// Register the complete task set. Succeeds at most once.
    ///
    /// Unknown dependencies, duplicate ids and cycles reject the whole set
    /// and leave the scheduler unregistered.
    pub fn register<I>(&self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = TaskDescriptor>,
    {
        self.core.register(tasks.into_iter().collect())
    }

    /// Dispatch every entry task. Only valid right after `register`.
    pub fn start(&self) -> Result<()> {
        self.core.start()
    }

    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        self.core.subscribe(observer);
    }

    /// Idempotent; blocks for at most twice the configured drain timeout.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    pub fn wait_for_all_complete(&self, timeout: Duration) -> bool {
        self.core.wait_for_all_complete(timeout)
    }

    pub fn is_all_complete(&self) -> bool {
        self.core.is_all_complete()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.core.phase()
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.core.status(id)
    }

    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.core.statuses()
    }

    pub fn entry_tasks(&self) -> Vec<TaskId> {
        self.core.entry_tasks()
    }

    /// Tasks that have not finalized yet.
    pub fn outstanding(&self) -> usize {
        self.core.outstanding()
    }

    /// Timing records ordered by task id.
    pub fn records(&self) -> Vec<TimingRecord> {
        self.core.recorder().records()
    }

    /// Timing records ordered by start time.
    pub fn timeline(&self) -> Vec<TimingRecord> {
        self.core.recorder().timeline()
    }

    pub fn total_span(&self) -> Option<Duration> {
        self.core.recorder().total_span()
    }

    pub fn worker_count(&self) -> usize {
        self.core.worker_count()
    }

    pub fn main_lane_name(&self) -> &str {
        self.core.main_lane_name()
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.core.config()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}
