// src/engine/mod.rs

//! Orchestration engine for bootdag.
//!
//! This module ties together:
//! - the task registry and completion cascade (from [`crate::dag`])
//! - the two execution lanes and task deadlines (from [`crate::exec`])
//! - completion tracking, notifications and timing records
//!
//! The shared state and the dispatch / finalize loop live in [`core`]; the
//! public entry point is the [`Scheduler`] façade in [`scheduler`].

pub mod cascade;
pub mod core;
pub mod notify;
pub mod scheduler;
pub mod timing;

pub use cascade::CompletionTracker;
pub use core::SchedulerCore;
pub use notify::{NotificationHub, TaskCompletion, TaskObserver};
pub use scheduler::Scheduler;
pub use timing::{TimingRecord, TimingRecorder, render_report};
