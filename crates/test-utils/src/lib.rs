pub mod builders;
pub mod manual_lane;
pub mod observer;

use std::sync::Once;
use std::time::Duration;

use bootdag::SchedulerConfig;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Scheduler config for tests: a small fixed pool, quick drain, and no
/// automatic shutdown so tests can inspect state after the run.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: Some(4),
        drain_timeout: Duration::from_millis(500),
        completion_grace: Duration::from_millis(10),
        auto_shutdown: false,
        ..SchedulerConfig::default()
    }
}

/// Generous upper bound for a test run to finish.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);
