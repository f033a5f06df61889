// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::dag::DagGraph;

pub use crate::config::SchedulerConfig;
pub use crate::dag::TaskDescriptor;
pub use crate::engine::{Scheduler, TaskCompletion, TaskObserver, TimingRecord, render_report};
pub use crate::errors::BootdagError;
pub use crate::exec::{SerialLane, ThreadLane};
pub use crate::types::{LaneKind, SchedulerPhase, TaskId, TaskStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - the scheduler, with a console observer
/// - Ctrl-C handling
/// - the final performance report
pub async fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate(&args.plan)?;

    if args.dry_run {
        print_dry_run(&plan)?;
        return Ok(());
    }

    let scheduler = Arc::new(Scheduler::new(plan.scheduler.clone())?);
    scheduler.subscribe(Arc::new(ConsoleObserver));
    scheduler.register(plan.descriptors())?;
    scheduler.start()?;
    info!(tasks = plan.task.len(), "startup plan running");

    let wait = Duration::from_millis(args.wait_ms);
    let waiter = {
        let scheduler = Arc::clone(&scheduler);
        tokio::task::spawn_blocking(move || scheduler.wait_for_all_complete(wait))
    };

    // Ctrl-C → stop waiting and shut down.
    let completed = tokio::select! {
        done = waiter => done?,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            } else {
                warn!("Ctrl+C received; shutting down");
            }
            false
        }
    };

    if !completed {
        warn!(
            outstanding = scheduler.outstanding(),
            statuses = ?scheduler.statuses(),
            "startup plan did not complete"
        );
    }

    print!("{}", render_report(&scheduler.timeline()));

    let shutdown = Arc::clone(&scheduler);
    tokio::task::spawn_blocking(move || shutdown.shutdown()).await?;
    Ok(())
}

/// Prints every completion as it happens.
struct ConsoleObserver;

impl TaskObserver for ConsoleObserver {
    fn on_task_complete(&self, completion: &TaskCompletion) {
        match &completion.error {
            None => println!(
                "[{}] {} ({}ms on {})",
                completion.status,
                completion.task_id,
                completion.record.duration().as_millis(),
                completion.record.lane
            ),
            Some(err) => println!(
                "[{}] {} ({}ms on {}): {err}",
                completion.status,
                completion.task_id,
                completion.record.duration().as_millis(),
                completion.record.lane
            ),
        }
    }

    fn on_all_complete(&self, timeline: &[TimingRecord]) {
        println!("all {} startup tasks finalized", timeline.len());
    }
}

/// Simple dry-run output: tasks in dependency order with their settings.
fn print_dry_run(plan: &PlanFile) -> Result<()> {
    let descriptors = plan.descriptors();
    let graph = DagGraph::build(&descriptors)?;
    let order = graph.topological_order()?;

    println!("bootdag dry-run");
    println!(
        "  scheduler.workers = {}",
        plan.scheduler.worker_pool_size()
    );
    println!("  scheduler.main_lane = {}", plan.scheduler.main_lane_name);
    println!(
        "  scheduler.default_task_timeout = {:?}",
        plan.scheduler.default_task_timeout
    );
    println!();

    println!("tasks ({}), in dependency order:", order.len());
    for name in &order {
        let Some(task) = plan.task.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      lane: {}", if task.main_lane { "main" } else { "worker" });
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(work) = task.work {
            println!("      work: {work:?}");
        }
        if let Some(timeout) = task.timeout {
            println!("      timeout: {timeout:?}");
        }
        if !task.allow_continue_on_timeout {
            println!("      allow_continue_on_timeout: false");
        }
        if let Some(ref reason) = task.fail {
            println!("      fail: {reason}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
