// src/engine/core.rs

//! Shared scheduler state and the dispatch / finalize / cascade loop.
//!
//! There is no central event loop: whichever lane finishes a task (or the
//! timer thread, when a deadline fires first) finalizes it, runs the cascade
//! and dispatches the released dependents itself. All cross-lane
//! coordination goes through the per-task atomics in
//! [`TaskStates`](crate::dag::TaskStates), so no lock is held while a task
//! body runs.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{SchedulerConfig, validate_scheduler_config};
use crate::dag::{TaskDescriptor, TaskRegistry};
use crate::engine::cascade::CompletionTracker;
use crate::engine::notify::{NotificationHub, TaskCompletion, TaskObserver};
use crate::engine::timing::{TimingRecord, TimingRecorder};
use crate::errors::{BootdagError, Result};
use crate::exec::{Deadline, SerialLane, ThreadLane, WorkerPool};
use crate::types::{LaneKind, SchedulerPhase, TaskId, TaskStatus};

/// Name of the thread that performs the automatic shutdown.
const REAPER_THREAD_NAME: &str = "bootdag-reaper";

/// State created by a successful registration.
#[derive(Debug)]
struct Registered {
    registry: TaskRegistry,
    tracker: CompletionTracker,
}

pub struct SchedulerCore {
    config: SchedulerConfig,
    phase: AtomicU8,
    registered: OnceLock<Registered>,
    pool: WorkerPool,
    main_lane: Arc<dyn SerialLane>,
    hub: NotificationHub,
    recorder: TimingRecorder,
    /// Set once the all-complete event has been published. Waiters must keep
    /// working after the pool runtime is gone, so this is not a tokio type.
    drained: Mutex<bool>,
    drained_cv: Condvar,
}

impl SchedulerCore {
    /// Build the worker pool and, unless one is supplied, the default
    /// [`ThreadLane`] main lane.
    pub fn new(config: SchedulerConfig, main_lane: Option<Arc<dyn SerialLane>>) -> Result<Self> {
        validate_scheduler_config(&config)?;

        let pool = WorkerPool::new(config.worker_pool_size())?;
        let main_lane: Arc<dyn SerialLane> = match main_lane {
            Some(lane) => lane,
            None => Arc::new(ThreadLane::spawn(config.main_lane_name.clone())?),
        };

        debug!(
            workers = pool.size(),
            main_lane = %main_lane.name(),
            default_timeout = ?config.default_task_timeout,
            "scheduler core created"
        );

        Ok(Self {
            config,
            phase: AtomicU8::new(SchedulerPhase::Unregistered as u8),
            registered: OnceLock::new(),
            pool,
            main_lane,
            hub: NotificationHub::new(),
            recorder: TimingRecorder::new(),
            drained: Mutex::new(false),
            drained_cv: Condvar::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn register(&self, tasks: Vec<TaskDescriptor>) -> Result<()> {
        if self.registered.get().is_some() {
            warn!("tasks already registered; rejecting second registration");
            return Err(BootdagError::DuplicateRegistration);
        }

        let phase = self.phase();
        if phase != SchedulerPhase::Unregistered {
            return Err(BootdagError::InvalidState {
                action: "register",
                phase,
            });
        }

        let registry = TaskRegistry::build(tasks).inspect_err(|err| {
            warn!(error = %err, "task registration rejected");
        })?;
        let tracker = CompletionTracker::new(registry.task_ids().map(str::to_string));
        let count = registry.len();

        if self.registered.set(Registered { registry, tracker }).is_err() {
            // Lost a race against a concurrent register().
            warn!("tasks already registered; rejecting second registration");
            return Err(BootdagError::DuplicateRegistration);
        }

        if !self.transition(SchedulerPhase::Unregistered, SchedulerPhase::Registered) {
            debug!(phase = ?self.phase(), "scheduler left Unregistered during registration");
        }
        info!(tasks = count, "tasks registered");
        Ok(())
    }

    pub fn start(self: &Arc<Self>) -> Result<()> {
        if let Err(actual) = self.phase.compare_exchange(
            SchedulerPhase::Registered as u8,
            SchedulerPhase::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(BootdagError::InvalidState {
                action: "start",
                phase: SchedulerPhase::from_u8(actual),
            });
        }

        let Some(reg) = self.registered.get() else {
            return Err(BootdagError::InvalidState {
                action: "start",
                phase: SchedulerPhase::Unregistered,
            });
        };

        let entries = reg.registry.entry_tasks();
        info!(
            tasks = reg.registry.len(),
            entry = ?entries,
            workers = self.pool.size(),
            main_lane = %self.main_lane.name(),
            "scheduler started"
        );

        if reg.tracker.drain_if_empty() {
            self.on_drained();
            return Ok(());
        }

        for id in &entries {
            self.dispatch(id);
        }
        Ok(())
    }

    /// Stop dispatching, let both lanes drain for up to the configured
    /// drain timeout, then abandon whatever is left. Only the first call
    /// does anything.
    pub fn shutdown(&self) {
        loop {
            let current = self.phase();
            if matches!(current, SchedulerPhase::Draining | SchedulerPhase::Shutdown) {
                debug!(phase = ?current, "shutdown already requested");
                return;
            }
            if self.transition(current, SchedulerPhase::Draining) {
                break;
            }
        }

        let outstanding = self
            .registered
            .get()
            .map(|reg| reg.tracker.outstanding())
            .unwrap_or(0);
        info!(outstanding, grace = ?self.config.drain_timeout, "scheduler draining");
        if outstanding > 0 {
            warn!(outstanding, "shutting down before every task finalized");
        }

        self.main_lane.shutdown(self.config.drain_timeout);
        self.pool.shutdown(self.config.drain_timeout);

        self.phase
            .store(SchedulerPhase::Shutdown as u8, Ordering::Release);
        {
            let _drained = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
            self.drained_cv.notify_all();
        }
        info!("scheduler shut down");
    }

    // ---------------------------------------------------------------------
    // Dispatch / finalize
    // ---------------------------------------------------------------------

    fn dispatch(self: &Arc<Self>, id: &str) {
        let phase = self.phase();
        if phase != SchedulerPhase::Running {
            debug!(task = %id, ?phase, "scheduler not running; dispatch skipped");
            return;
        }

        let Some(reg) = self.registered.get() else {
            return;
        };
        let Some(descriptor) = reg.registry.descriptor(id) else {
            warn!(task = %id, "dispatch requested for unknown task");
            return;
        };

        if !reg.registry.states().try_begin(id) {
            debug!(task = %id, "task already dispatched; skipping");
            return;
        }

        let lane = descriptor.lane_kind();
        debug!(task = %id, ?lane, "dispatching task");

        let core = Arc::clone(self);
        let task_id = id.to_string();
        match lane {
            LaneKind::Worker => self.pool.submit(Box::new(move || core.run_task(&task_id))),
            LaneKind::Main => {
                if let Err(err) = self.main_lane.post(Box::new(move || core.run_task(&task_id))) {
                    error!(task = %id, error = %err, "could not post task to the main lane");
                    let now = Instant::now();
                    self.finalize(
                        id,
                        TaskStatus::Failed,
                        now,
                        now,
                        self.main_lane.name().to_string(),
                        Some(err.to_string()),
                    );
                }
            }
        }
    }

    /// Body of every dispatched job, on whichever lane it landed.
    fn run_task(self: &Arc<Self>, id: &str) {
        let Some(descriptor) = self
            .registered
            .get()
            .and_then(|reg| reg.registry.descriptor(id))
        else {
            return;
        };

        let lane = match descriptor.lane_kind() {
            LaneKind::Main => self.main_lane.name().to_string(),
            LaneKind::Worker => thread::current()
                .name()
                .unwrap_or("unnamed-worker")
                .to_string(),
        };
        let timeout = descriptor.effective_timeout(self.config.default_task_timeout);
        let start = Instant::now();
        debug!(task = %id, lane = %lane, ?timeout, "task running");

        let deadline = {
            let core = Arc::clone(self);
            let task_id = id.to_string();
            let lane = lane.clone();
            Deadline::arm(self.pool.handle(), timeout, move || {
                let reason = format!("timed out after {}ms", timeout.as_millis());
                core.finalize(&task_id, TaskStatus::TimedOut, start, Instant::now(), lane, Some(reason));
            })
        };

        let execute = descriptor.executable();
        let outcome = catch_unwind(AssertUnwindSafe(|| execute()));
        deadline.disarm();
        let end = Instant::now();

        let (status, error) = match outcome {
            Ok(Ok(())) => (TaskStatus::Succeeded, None),
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                error!(task = %id, error = %message, "task failed");
                (TaskStatus::Failed, Some(message))
            }
            Err(payload) => {
                let message = format!("panicked: {}", panic_message(payload.as_ref()));
                error!(task = %id, error = %message, "task panicked");
                (TaskStatus::Failed, Some(message))
            }
        };

        if !self.finalize(id, status, start, end, lane, error) {
            warn!(
                task = %id,
                outcome = %status,
                "task finished after its deadline; result discarded"
            );
        }
    }

    /// Finalize `id` exactly once. Returns `false` when another path got
    /// there first.
    fn finalize(
        self: &Arc<Self>,
        id: &str,
        status: TaskStatus,
        start: Instant,
        end: Instant,
        lane: String,
        error: Option<String>,
    ) -> bool {
        let Some(reg) = self.registered.get() else {
            return false;
        };
        if !reg.registry.states().try_finalize(id, status) {
            return false;
        }

        let record = TimingRecord {
            task_id: id.to_string(),
            start,
            end,
            lane,
        };
        self.recorder.record(record.clone());

        let duration_ms = record.duration().as_millis() as u64;
        if status == TaskStatus::TimedOut {
            warn!(task = %id, lane = %record.lane, duration_ms, "task timed out");
        } else {
            info!(task = %id, status = %status, lane = %record.lane, duration_ms, "task finalized");
        }

        self.hub.publish_task_complete(&TaskCompletion {
            task_id: id.to_string(),
            status,
            record,
            error,
        });

        let step = reg.registry.cascade(id, status);
        for dependent in &step.released {
            self.dispatch(dependent);
        }

        if reg.tracker.mark_finalized(id) {
            self.on_drained();
        }
        true
    }

    fn on_drained(self: &Arc<Self>) {
        let timeline = self.recorder.timeline();
        info!(
            tasks = timeline.len(),
            total_ms = self.recorder.total_span().unwrap_or_default().as_millis() as u64,
            "all tasks complete"
        );

        self.hub.publish_all_complete(&timeline);
        {
            let mut drained = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
            *drained = true;
            self.drained_cv.notify_all();
        }

        if !self.config.auto_shutdown {
            return;
        }

        let core = Arc::clone(self);
        let grace = self.config.completion_grace;
        let spawned = thread::Builder::new()
            .name(REAPER_THREAD_NAME.to_string())
            .spawn(move || {
                thread::sleep(grace);
                core.shutdown();
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn shutdown thread; shutting down inline");
            self.shutdown();
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn phase(&self) -> SchedulerPhase {
        SchedulerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        self.hub.subscribe(observer);
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.registered.get()?.registry.states().status(id)
    }

    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.registered
            .get()
            .map(|reg| reg.registry.states().snapshot())
            .unwrap_or_default()
    }

    pub fn entry_tasks(&self) -> Vec<TaskId> {
        self.registered
            .get()
            .map(|reg| reg.registry.entry_tasks())
            .unwrap_or_default()
    }

    pub fn outstanding(&self) -> usize {
        self.registered
            .get()
            .map(|reg| reg.tracker.outstanding())
            .unwrap_or(0)
    }

    pub fn recorder(&self) -> &TimingRecorder {
        &self.recorder
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    pub fn main_lane_name(&self) -> &str {
        self.main_lane.name()
    }

    pub fn is_all_complete(&self) -> bool {
        *self.drained.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the all-complete event, shutdown, or `timeout`.
    pub fn wait_for_all_complete(&self, timeout: Duration) -> bool {
        let guard = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _timed_out) = self
            .drained_cv
            .wait_timeout_while(guard, timeout, |drained| {
                !*drained && self.phase() != SchedulerPhase::Shutdown
            })
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn transition(&self, from: SchedulerPhase, to: SchedulerPhase) -> bool {
        let moved = self
            .phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            debug!(?from, ?to, "scheduler phase changed");
        }
        moved
    }
}

impl std::fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("phase", &self.phase())
            .field("workers", &self.pool.size())
            .field("main_lane", &self.main_lane.name())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
