// src/exec/pool.rs

//! Bounded worker pool for background tasks, plus the timer driver used by
//! task deadlines.
//!
//! Backed by a private multi-thread Tokio runtime: background tasks run as
//! `spawn_blocking` jobs (capped at the pool size), while deadline timers run
//! on the runtime's single async worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::Job;

/// Prefix of the pool's thread names, e.g. `bootdag-worker-3`.
pub const WORKER_THREAD_PREFIX: &str = "bootdag-worker";

pub struct WorkerPool {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name_fn(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                format!("{WORKER_THREAD_PREFIX}-{n}")
            })
            .enable_time()
            .build()?;

        debug!(size, "worker pool started");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            size,
        })
    }

    /// Maximum number of background tasks running at the same time.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handle used to arm deadline timers.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Queue a blocking job. Jobs beyond the pool size wait for a free slot.
    pub fn submit(&self, job: Job) {
        // Completion is observed through the scheduler, not the JoinHandle.
        drop(self.handle.spawn_blocking(job));
    }

    /// Wait up to `grace` for running jobs, then abandon the rest.
    ///
    /// Jobs still queued are cancelled; jobs already running cannot be
    /// interrupted and are left to finish on detached threads.
    pub fn shutdown(&self, grace: Duration) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(runtime) = runtime else {
            return;
        };

        if Handle::try_current().is_ok() {
            // Blocking on runtime teardown is not allowed from inside a
            // runtime (including our own pool threads).
            debug!("worker pool shutdown requested from a runtime context; not waiting");
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(grace);
        }
        info!(size = self.size, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn jobs_run_on_named_worker_threads() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with(WORKER_THREAD_PREFIX), "got {name}");
        pool.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn concurrency_is_capped_at_pool_size() {
        let pool = WorkerPool::new(2).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..6 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            }));
        }
        for _ in 0..6 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        pool.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown(Duration::from_millis(100));
        pool.shutdown(Duration::from_millis(100));
        // Submitting afterwards is silently dropped.
        pool.submit(Box::new(|| {}));
    }
}
