// src/exec/mod.rs

//! Execution layer.
//!
//! This module owns the places task bodies actually run, and knows nothing
//! about the dependency graph:
//!
//! - [`backend`] provides the [`SerialLane`] trait and the default
//!   [`ThreadLane`] used for main-lane tasks.
//! - [`pool`] provides the bounded [`WorkerPool`] for every other task, and
//!   the timer driver.
//! - [`deadline`] provides the cancellable per-task [`Deadline`].

pub mod backend;
pub mod deadline;
pub mod pool;

pub use backend::{SerialLane, ThreadLane};
pub use deadline::Deadline;
pub use pool::{WORKER_THREAD_PREFIX, WorkerPool};

/// A unit of work handed to a lane.
pub type Job = Box<dyn FnOnce() + Send + 'static>;
