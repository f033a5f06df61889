// src/exec/backend.rs

//! Pluggable serial ("main") lane abstraction.
//!
//! The scheduler posts main-lane tasks to a [`SerialLane`] instead of a
//! concrete thread. This makes it easy to bind the lane to an application's
//! own event loop, or to swap in a hand-pumped lane in tests.
//!
//! - [`ThreadLane`] is the default implementation: one dedicated, named OS
//!   thread draining a FIFO channel.
//! - Tests (see `bootdag-test-utils`) provide a lane that only runs jobs when
//!   the test pumps it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{BootdagError, Result};
use crate::exec::Job;

/// A single-worker FIFO execution context.
///
/// Implementations must run posted jobs one at a time, in posting order.
pub trait SerialLane: Send + Sync {
    /// Identity recorded in timing records for tasks run on this lane.
    fn name(&self) -> &str;

    /// Queue `job` behind everything posted before it.
    fn post(&self, job: Job) -> Result<()>;

    /// Stop accepting jobs and let queued ones drain for up to `grace`.
    ///
    /// Externally-owned lanes (an application's UI loop) usually have
    /// nothing to tear down, hence the no-op default.
    fn shutdown(&self, grace: Duration) {
        let _ = grace;
    }
}

/// Default serial lane: a dedicated OS thread fed by an unbounded channel.
pub struct ThreadLane {
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    /// Once set, the thread discards whatever is still queued.
    abort: Arc<AtomicBool>,
    exited: Mutex<Option<std_mpsc::Receiver<()>>>,
    thread_id: ThreadId,
}

impl ThreadLane {
    /// Spawn the lane thread immediately.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let (exit_tx, exit_rx) = std_mpsc::channel::<()>();
        let abort = Arc::new(AtomicBool::new(false));

        let thread_abort = Arc::clone(&abort);
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!(lane = %thread_name, "serial lane started");

            let mut discarded = 0usize;
            while let Some(job) = rx.blocking_recv() {
                if thread_abort.load(Ordering::Acquire) {
                    discarded += 1;
                    continue;
                }
                job();
            }

            if discarded > 0 {
                warn!(lane = %thread_name, discarded, "serial lane dropped queued jobs on shutdown");
            }
            debug!(lane = %thread_name, "serial lane finished (channel closed)");
            let _ = exit_tx.send(());
        })?;

        Ok(Self {
            name,
            tx: Mutex::new(Some(tx)),
            abort,
            exited: Mutex::new(Some(exit_rx)),
            thread_id: handle.thread().id(),
        })
    }
}

impl SerialLane for ThreadLane {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<()> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| BootdagError::LaneClosed(self.name.clone())),
            None => Err(BootdagError::LaneClosed(self.name.clone())),
        }
    }

    fn shutdown(&self, grace: Duration) {
        // Dropping the sender lets the thread finish the queue and exit.
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if thread::current().id() == self.thread_id {
            // Called from a job on this very lane; it cannot exit under us.
            debug!(lane = %self.name, "serial lane shutdown requested from its own thread");
            return;
        }

        let Some(exited) = self
            .exited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        match exited.recv_timeout(grace) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                info!(lane = %self.name, "serial lane drained");
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                self.abort.store(true, Ordering::Release);
                warn!(
                    lane = %self.name,
                    ?grace,
                    "serial lane did not drain in time; abandoning it"
                );
            }
        }
    }
}

impl Drop for ThreadLane {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::Release);
    }
}
