// src/config/mod.rs

//! Configuration loading and validation for bootdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and [`SchedulerConfig`] (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate basic invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{PlanFile, PlanTask, RawPlanFile, SchedulerConfig, parse_duration};
pub use validate::validate_scheduler_config;
