// src/config/validate.rs

use crate::config::model::{PlanFile, RawPlanFile, SchedulerConfig};
use crate::dag::DagGraph;
use crate::errors::{BootdagError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::BootdagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.scheduler, raw.task))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_scheduler_config(&plan.scheduler)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(BootdagError::ConfigError(
            "plan must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

/// Sanity-check scheduler tuning. Also applied by `Scheduler::new`.
pub fn validate_scheduler_config(cfg: &SchedulerConfig) -> Result<()> {
    if cfg.worker_multiplier == 0 {
        return Err(BootdagError::ConfigError(
            "[scheduler].worker_multiplier must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.worker_threads == Some(0) {
        return Err(BootdagError::ConfigError(
            "[scheduler].worker_threads must be >= 1 when set (got 0)".to_string(),
        ));
    }

    if cfg.main_lane_name.trim().is_empty() {
        return Err(BootdagError::ConfigError(
            "[scheduler].main_lane_name must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Unknown `after` references and cycles are reported with the same errors
/// `Scheduler::register` would return.
fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    let descriptors: Vec<_> = plan
        .task
        .iter()
        .map(|(id, task)| task.to_descriptor(id))
        .collect();

    let graph = DagGraph::build(&descriptors)?;
    match graph.find_cycle() {
        Some(cycle) => Err(BootdagError::CircularDependency(cycle)),
        None => Ok(()),
    }
}
