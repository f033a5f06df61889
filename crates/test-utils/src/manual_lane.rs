use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use bootdag::SerialLane;
use bootdag::errors::{BootdagError, Result};
use bootdag::exec::Job;

/// A serial lane that only runs jobs when the test pumps it, on the test's
/// own thread. Models an application that owns its main loop.
pub struct ManualLane {
    name: String,
    state: Mutex<LaneState>,
    posted: Condvar,
}

#[derive(Default)]
struct LaneState {
    queue: VecDeque<Job>,
    closed: bool,
}

impl ManualLane {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(LaneState::default()),
            posted: Condvar::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Run every job queued right now. Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.next_job() {
            job();
            ran += 1;
        }
        ran
    }

    /// Keep pumping until `done()` holds or `timeout` elapses.
    pub fn pump_until(&self, timeout: Duration, done: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let guard = self.state.lock().unwrap();
            let wait = (deadline - now).min(Duration::from_millis(10));
            let _ = self
                .posted
                .wait_timeout_while(guard, wait, |s| s.queue.is_empty())
                .unwrap();
        }
    }

    fn next_job(&self) -> Option<Job> {
        self.state.lock().unwrap().queue.pop_front()
    }
}

impl SerialLane for ManualLane {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(BootdagError::LaneClosed(self.name.clone()));
        }
        state.queue.push_back(job);
        self.posted.notify_all();
        Ok(())
    }

    fn shutdown(&self, _grace: Duration) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.queue.clear();
    }
}
