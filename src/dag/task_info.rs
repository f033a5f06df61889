// src/dag/task_info.rs

//! Task descriptors: the immutable declaration of one unit of startup work.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{LaneKind, TaskId};

/// The executable part of a task.
///
/// It is called exactly once per run. An `Err` return (or a panic) marks the
/// task `Failed`; it never aborts the run.
pub type TaskFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Default allowance for a task that does not set its own timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(20);

/// Immutable declaration of one startup task.
///
/// Built with [`TaskDescriptor::new`] and the chained setters, then handed to
/// [`Scheduler::register`](crate::engine::Scheduler::register).
///
/// ```
/// use std::time::Duration;
/// use bootdag::dag::TaskDescriptor;
///
/// let config = TaskDescriptor::new("ConfigLoad", || Ok(()))
///     .on_main_lane()
///     .depends_on("StorageInit")
///     .timeout(Duration::from_secs(3));
/// assert!(config.runs_on_main_lane());
/// ```
#[derive(Clone)]
pub struct TaskDescriptor {
    id: TaskId,
    runs_on_main_lane: bool,
    dependency_ids: BTreeSet<TaskId>,
    timeout: Option<Duration>,
    allow_continue_on_timeout: bool,
    execute: TaskFn,
}

impl TaskDescriptor {
    pub fn new<F>(id: impl Into<TaskId>, execute: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            runs_on_main_lane: false,
            dependency_ids: BTreeSet::new(),
            timeout: None,
            allow_continue_on_timeout: true,
            execute: Arc::new(execute),
        }
    }

    /// Route this task to the serial main lane instead of the worker pool.
    pub fn on_main_lane(mut self) -> Self {
        self.runs_on_main_lane = true;
        self
    }

    /// Declare a prerequisite. Repeated ids collapse into one dependency.
    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.dependency_ids.insert(id.into());
        self
    }

    pub fn depends_on_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependency_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether this task may still be released when one of its prerequisites
    /// timed out. Defaults to `true`.
    pub fn allow_continue_on_timeout(mut self, allow: bool) -> Self {
        self.allow_continue_on_timeout = allow;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn runs_on_main_lane(&self) -> bool {
        self.runs_on_main_lane
    }

    pub fn lane_kind(&self) -> LaneKind {
        if self.runs_on_main_lane {
            LaneKind::Main
        } else {
            LaneKind::Worker
        }
    }

    pub fn dependency_ids(&self) -> &BTreeSet<TaskId> {
        &self.dependency_ids
    }

    /// The timeout explicitly set on this task, if any.
    pub fn explicit_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The timeout to apply, falling back to the scheduler-wide default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    pub fn allows_continue_on_timeout(&self) -> bool {
        self.allow_continue_on_timeout
    }

    pub(crate) fn executable(&self) -> TaskFn {
        Arc::clone(&self.execute)
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("runs_on_main_lane", &self.runs_on_main_lane)
            .field("dependency_ids", &self.dependency_ids)
            .field("timeout", &self.timeout)
            .field("allow_continue_on_timeout", &self.allow_continue_on_timeout)
            .finish_non_exhaustive()
    }
}
