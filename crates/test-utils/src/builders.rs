#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bootdag::TaskDescriptor;

/// Shared log of task start/end instants, keyed by task id.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    events: Arc<Mutex<Vec<Execution>>>,
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub task: String,
    pub started: Instant,
    pub finished: Instant,
    pub thread: Option<String>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, execution: Execution) {
        self.events.lock().unwrap().push(execution);
    }

    /// Executions in the order they finished.
    pub fn executions(&self) -> Vec<Execution> {
        self.events.lock().unwrap().clone()
    }

    pub fn get(&self, task: &str) -> Option<Execution> {
        self.executions().into_iter().find(|e| e.task == task)
    }

    pub fn ran(&self, task: &str) -> bool {
        self.get(task).is_some()
    }

    /// Task ids in execution order.
    pub fn order(&self) -> Vec<String> {
        self.executions().into_iter().map(|e| e.task).collect()
    }

    pub fn count(&self, task: &str) -> usize {
        self.executions().iter().filter(|e| e.task == task).count()
    }
}

/// A task that sleeps for `work`, records its execution in `log`, and
/// succeeds.
pub fn recording_task(id: &str, work: Duration, log: &ExecutionLog) -> TaskDescriptor {
    let task = id.to_string();
    let log = log.clone();
    TaskDescriptor::new(id, move || {
        let started = Instant::now();
        std::thread::sleep(work);
        log.push(Execution {
            task: task.clone(),
            started,
            finished: Instant::now(),
            thread: std::thread::current().name().map(str::to_string),
        });
        Ok(())
    })
}

/// A task that records itself and then fails with `reason`.
pub fn failing_task(id: &str, reason: &str, log: &ExecutionLog) -> TaskDescriptor {
    let task = id.to_string();
    let reason = reason.to_string();
    let log = log.clone();
    TaskDescriptor::new(id, move || {
        let started = Instant::now();
        log.push(Execution {
            task: task.clone(),
            started,
            finished: Instant::now(),
            thread: std::thread::current().name().map(str::to_string),
        });
        anyhow::bail!("{reason}")
    })
}

/// A task that just sleeps; use with a short timeout to force `TimedOut`.
pub fn sleeping_task(id: &str, work: Duration) -> TaskDescriptor {
    TaskDescriptor::new(id, move || {
        std::thread::sleep(work);
        Ok(())
    })
}
