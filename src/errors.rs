// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::{SchedulerPhase, TaskId};

#[derive(Error, Debug)]
pub enum BootdagError {
    /// The dependency graph contains a cycle. The path repeats its first
    /// task at the end, e.g. `["A", "B", "A"]`.
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<TaskId>),

    #[error("Tasks have already been registered")]
    DuplicateRegistration,

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Task id '{0}' is declared more than once")]
    DuplicateTaskId(TaskId),

    #[error("Cannot {action} while scheduler is {phase:?}")]
    InvalidState {
        action: &'static str,
        phase: SchedulerPhase,
    },

    #[error("Serial lane '{0}' is closed")]
    LaneClosed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BootdagError {
    /// Whether this error came out of `register` (graph validation or the
    /// one-shot guard), as opposed to lifecycle or IO problems.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            BootdagError::CircularDependency(_)
                | BootdagError::DuplicateRegistration
                | BootdagError::UnknownDependency { .. }
                | BootdagError::DuplicateTaskId(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BootdagError>;
