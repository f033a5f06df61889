// src/dag/mod.rs

//! DAG representation and per-task state.
//!
//! - [`task_info`] holds the immutable [`TaskDescriptor`].
//! - [`graph`] builds forward/reverse adjacency and detects cycles.
//! - [`state_manager`] holds the per-task atomics (status, remaining
//!   prerequisites) shared by every lane.
//! - [`registry`] ties the three together and implements the completion
//!   cascade.
//! - [`scheduler_step`] defines the result type of one cascade step.

pub mod graph;
pub mod registry;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use registry::TaskRegistry;
pub use scheduler_step::CascadeStep;
pub use state_manager::TaskStates;
pub use task_info::{DEFAULT_TASK_TIMEOUT, TaskDescriptor, TaskFn};
