#![allow(dead_code)]

use bootdag::Scheduler;
use bootdag_test_utils::builders::ExecutionLog;
use bootdag_test_utils::{init_tracing, test_config};

/// A fresh scheduler with the test config and tracing installed.
pub fn new_scheduler() -> Scheduler {
    init_tracing();
    Scheduler::new(test_config()).expect("scheduler should build")
}

/// `task` must have started no earlier than `prerequisite` finished.
pub fn assert_started_after(log: &ExecutionLog, task: &str, prerequisite: &str) {
    let task_run = log.get(task).unwrap_or_else(|| panic!("{task} never ran"));
    let prereq_run = log
        .get(prerequisite)
        .unwrap_or_else(|| panic!("{prerequisite} never ran"));
    assert!(
        task_run.started >= prereq_run.finished,
        "{task} started before {prerequisite} finished"
    );
}

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// elapses.
pub fn wait_until(timeout: std::time::Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    condition()
}
