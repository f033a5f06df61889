// src/exec/deadline.rs

//! Cancellable per-task deadline.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::trace;

/// A timer that runs `on_expiry` unless it is disarmed first.
///
/// Disarming (or dropping) the handle cancels the timer. Firing and normal
/// completion can still race right at the boundary; callers resolve that
/// with the finalize-once guard, not here.
#[derive(Debug)]
pub struct Deadline {
    cancel: Option<oneshot::Sender<()>>,
}

impl Deadline {
    pub fn arm<F>(handle: &Handle, after: Duration, on_expiry: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        handle.spawn(async move {
            tokio::select! {
                _ = sleep(after) => {
                    trace!(?after, "deadline expired");
                    on_expiry();
                }
                // Explicit cancel or the handle was dropped.
                _ = cancel_rx => {}
            }
        });

        Self {
            cancel: Some(cancel_tx),
        }
    }

    pub fn disarm(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
