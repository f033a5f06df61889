// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::dag::{DEFAULT_TASK_TIMEOUT, TaskDescriptor};

/// Top-level plan file as read from TOML.
///
/// ```toml
/// [scheduler]
/// worker_multiplier = 2
/// drain_timeout = "1s"
///
/// [task.StorageInit]
/// work = "500ms"
///
/// [task.ConfigLoad]
/// main_lane = true
/// after = ["StorageInit"]
/// work = "300ms"
/// ```
///
/// All sections are optional and have reasonable defaults; use
/// [`PlanFile`] (validated) rather than this raw form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Scheduler tuning from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, PlanTask>,
}

/// A validated plan file: task references resolve and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub scheduler: SchedulerConfig,
    pub task: BTreeMap<String, PlanTask>,
}

impl PlanFile {
    /// Only for use after validation; see `TryFrom<RawPlanFile>`.
    pub(crate) fn new_unchecked(
        scheduler: SchedulerConfig,
        task: BTreeMap<String, PlanTask>,
    ) -> Self {
        Self { scheduler, task }
    }

    /// Turn every `[task.<id>]` into a simulated startup task.
    pub fn descriptors(&self) -> Vec<TaskDescriptor> {
        self.task
            .iter()
            .map(|(id, task)| task.to_descriptor(id))
            .collect()
    }
}

/// `[scheduler]` section, also the programmatic scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Worker pool size = available parallelism × this multiplier.
    ///
    /// Oversubscribed on purpose: startup tasks mostly block on I/O.
    #[serde(default = "default_worker_multiplier")]
    pub worker_multiplier: usize,

    /// Absolute worker pool size; overrides `worker_multiplier` when set.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Name of the serial main lane thread (and of its timing records).
    #[serde(default = "default_main_lane_name")]
    pub main_lane_name: String,

    /// How long `shutdown()` waits for each lane to drain before forcing.
    #[serde(default = "default_drain_timeout", deserialize_with = "de_duration")]
    pub drain_timeout: Duration,

    /// Delay between the all-complete event and the automatic shutdown.
    #[serde(default = "default_completion_grace", deserialize_with = "de_duration")]
    pub completion_grace: Duration,

    /// Shut down automatically once every task has finalized.
    #[serde(default = "default_true")]
    pub auto_shutdown: bool,

    /// Timeout for tasks that do not set their own.
    #[serde(default = "default_task_timeout", deserialize_with = "de_duration")]
    pub default_task_timeout: Duration,
}

fn default_worker_multiplier() -> usize {
    2
}

fn default_main_lane_name() -> String {
    "bootdag-main".to_string()
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_completion_grace() -> Duration {
    Duration::from_millis(600)
}

fn default_task_timeout() -> Duration {
    DEFAULT_TASK_TIMEOUT
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_multiplier: default_worker_multiplier(),
            worker_threads: None,
            main_lane_name: default_main_lane_name(),
            drain_timeout: default_drain_timeout(),
            completion_grace: default_completion_grace(),
            auto_shutdown: true,
            default_task_timeout: default_task_timeout(),
        }
    }
}

impl SchedulerConfig {
    /// Effective worker pool size.
    pub fn worker_pool_size(&self) -> usize {
        match self.worker_threads {
            Some(n) => n,
            None => {
                let parallelism = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                parallelism * self.worker_multiplier
            }
        }
    }
}

/// `[task.<id>]` section: a simulated startup task.
///
/// The task sleeps for `work`, then either logs `message` and succeeds, or
/// fails with `fail` when that is set.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanTask {
    /// Prerequisites: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Run on the serial main lane instead of the worker pool.
    #[serde(default)]
    pub main_lane: bool,

    /// Simulated work, e.g. `"500ms"`.
    #[serde(default, deserialize_with = "de_opt_duration")]
    pub work: Option<Duration>,

    /// Per-task timeout; falls back to `[scheduler].default_task_timeout`.
    #[serde(default, deserialize_with = "de_opt_duration")]
    pub timeout: Option<Duration>,

    #[serde(default = "default_true")]
    pub allow_continue_on_timeout: bool,

    /// When set, the task fails with this message after its work.
    #[serde(default)]
    pub fail: Option<String>,

    /// Logged when the task succeeds.
    #[serde(default)]
    pub message: Option<String>,
}

impl PlanTask {
    pub fn to_descriptor(&self, id: &str) -> TaskDescriptor {
        let task_id = id.to_string();
        let work = self.work.unwrap_or_default();
        let fail = self.fail.clone();
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("{id} initialized"));

        let mut descriptor = TaskDescriptor::new(id, move || {
            std::thread::sleep(work);
            if let Some(reason) = &fail {
                anyhow::bail!("{task_id}: {reason}");
            }
            tracing::info!(task = %task_id, "{message}");
            Ok(())
        })
        .depends_on_all(self.after.iter().cloned())
        .allow_continue_on_timeout(self.allow_continue_on_timeout);

        if self.main_lane {
            descriptor = descriptor.on_main_lane();
        }
        if let Some(timeout) = self.timeout {
            descriptor = descriptor.timeout(timeout);
        }
        descriptor
    }
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn de_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_duration(&s))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Parse durations like `"250ms"`, `"3s"`, `"1m"`, `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("3 days").is_err());
    }

    #[test]
    fn empty_scheduler_section_uses_defaults() {
        let raw: RawPlanFile = toml::from_str("[scheduler]\n").unwrap();
        let cfg = raw.scheduler;
        assert_eq!(cfg.worker_multiplier, 2);
        assert_eq!(cfg.main_lane_name, "bootdag-main");
        assert_eq!(cfg.drain_timeout, Duration::from_secs(1));
        assert_eq!(cfg.completion_grace, Duration::from_millis(600));
        assert!(cfg.auto_shutdown);
        assert_eq!(cfg.default_task_timeout, Duration::from_secs(20));
    }

    #[test]
    fn explicit_worker_threads_override_the_multiplier() {
        let cfg = SchedulerConfig {
            worker_threads: Some(3),
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.worker_pool_size(), 3);
        assert!(SchedulerConfig::default().worker_pool_size() >= 2);
    }

    #[test]
    fn task_section_maps_onto_a_descriptor() {
        let raw: RawPlanFile = toml::from_str(
            r#"
[task.ConfigLoad]
main_lane = true
after = ["StorageInit"]
work = "1ms"
timeout = "3s"
allow_continue_on_timeout = false
"#,
        )
        .unwrap();

        let task = raw.task["ConfigLoad"].to_descriptor("ConfigLoad");
        assert!(task.runs_on_main_lane());
        assert!(task.dependency_ids().contains("StorageInit"));
        assert_eq!(task.explicit_timeout(), Some(Duration::from_secs(3)));
        assert!(!task.allows_continue_on_timeout());
    }

    #[test]
    fn failing_plan_task_returns_its_reason() {
        let raw: RawPlanFile = toml::from_str(
            r#"
[task.Broken]
fail = "disk unavailable"
"#,
        )
        .unwrap();
        let task = raw.task["Broken"].to_descriptor("Broken");
        let err = (task.executable())().unwrap_err();
        assert!(err.to_string().contains("disk unavailable"));
    }
}
