mod common;

use std::sync::Arc;
use std::time::Duration;

use bootdag::{TaskStatus, TimingRecord};
use bootdag_test_utils::RUN_TIMEOUT;
use bootdag_test_utils::builders::{ExecutionLog, recording_task};
use bootdag_test_utils::observer::RecordingObserver;
use common::new_scheduler;

#[test]
fn all_complete_fires_once_when_the_last_tasks_finish_on_different_lanes() {
    for _ in 0..30 {
        let log = ExecutionLog::new();
        let scheduler = new_scheduler();
        let observer = Arc::new(RecordingObserver::new());
        scheduler.subscribe(observer.clone());

        scheduler
            .register([
                recording_task("OnMain", Duration::from_millis(2), &log).on_main_lane(),
                recording_task("OnWorker", Duration::from_millis(2), &log),
                recording_task("AlsoWorker", Duration::from_millis(2), &log),
            ])
            .unwrap();
        scheduler.start().unwrap();

        assert!(scheduler.wait_for_all_complete(RUN_TIMEOUT));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(observer.all_complete_calls(), 1);
        assert_eq!(observer.completions().len(), 3);
        assert!(scheduler.is_all_complete());
    }
}

#[test]
fn completions_arrive_in_dependency_order() {
    let log = ExecutionLog::new();
    let scheduler = new_scheduler();
    let observer = Arc::new(RecordingObserver::new());
    scheduler.subscribe(observer.clone());

    scheduler
        .register([
            recording_task("A", Duration::from_millis(2), &log),
            recording_task("B", Duration::from_millis(2), &log)
                .on_main_lane()
                .depends_on("A"),
            recording_task("C", Duration::from_millis(2), &log).depends_on("B"),
        ])
        .unwrap();
    scheduler.start().unwrap();

    assert!(scheduler.wait_for_all_complete(RUN_TIMEOUT));
    assert_eq!(observer.completed_ids(), ["A", "B", "C"]);
    assert!(
        observer
            .completions()
            .iter()
            .all(|c| c.status == TaskStatus::Succeeded && c.record.task_id == c.task_id)
    );
}

#[test]
fn timeline_is_sorted_by_start_and_span_covers_every_record() {
    let log = ExecutionLog::new();
    let scheduler = new_scheduler();
    let observer = Arc::new(RecordingObserver::new());
    scheduler.subscribe(observer.clone());

    scheduler
        .register([
            recording_task("Zeta", Duration::from_millis(30), &log),
            recording_task("Alpha", Duration::from_millis(10), &log).depends_on("Zeta"),
            recording_task("Mid", Duration::from_millis(20), &log),
            recording_task("Last", Duration::from_millis(5), &log)
                .on_main_lane()
                .depends_on("Alpha")
                .depends_on("Mid"),
        ])
        .unwrap();
    scheduler.start().unwrap();
    assert!(scheduler.wait_for_all_complete(RUN_TIMEOUT));

    let timeline = scheduler.timeline();
    assert_eq!(timeline.len(), 4);
    assert!(timeline.windows(2).all(|w| w[0].start <= w[1].start));

    let first = timeline.iter().map(|r| r.start).min().unwrap();
    let last = timeline.iter().map(|r| r.end).max().unwrap();
    assert_eq!(scheduler.total_span(), Some(last - first));
    assert!(scheduler.total_span().unwrap() >= Duration::from_millis(45));

    // The all-complete event carries the same timeline.
    let delivered: Vec<TimingRecord> = observer.final_timeline();
    assert_eq!(delivered, timeline);

    let report = bootdag::render_report(&timeline);
    for record in &timeline {
        assert!(report.contains(&record.task_id));
    }
}

#[test]
fn total_span_is_undefined_before_anything_finishes() {
    let scheduler = new_scheduler();
    assert_eq!(scheduler.total_span(), None);
    assert!(scheduler.timeline().is_empty());
}
