#![cfg(unix)]

use std::time::{Duration, Instant};

use taskgroup::engine::RunOutcome;
use taskgroup::{CommandTask, Executor, Task, TaskGroup, TaskStatus};
use taskgroup_test_utils::fake_payload::RecordingDelegate;
use taskgroup_test_utils::{init_tracing, wait_until, with_timeout};

#[tokio::test]
async fn exit_codes_map_to_outcomes() {
    init_tracing();
    let ok = Task::builder(CommandTask::new("exit 0")).tag("ok").build();
    let bad = Task::builder(CommandTask::new("exit 3")).tag("bad").build();

    let mut group = TaskGroup::new();
    group.add_task(&ok).unwrap();
    group.add_task(&bad).unwrap();

    let summary = with_timeout(Executor::new().submit(&group, ()).unwrap().wait())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Finished);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(ok.status(), TaskStatus::Succeeded);
    assert_eq!(bad.status(), TaskStatus::Failed);
    assert_eq!(bad.failure().unwrap().message(), "exit code 3");
}

#[tokio::test]
async fn stdout_progress_lines_are_reported() {
    init_tracing();
    let payload = CommandTask::new("echo 'progress: 25%'; echo noise; echo 'progress: 50%'; exit 1")
        .with_progress_pattern(r"^progress: (\d+)%")
        .unwrap();
    let t = Task::builder(payload).tag("progressing").build();

    let mut group = TaskGroup::new();
    group.add_task(&t).unwrap();

    let delegate = RecordingDelegate::new();
    let summary = with_timeout(Executor::new().submit(&group, delegate.clone()).unwrap().wait())
        .await
        .unwrap();

    // The task failed, so its last reported progress is kept.
    assert_eq!(summary.failure_count, 1);
    assert!((t.progress() - 0.5).abs() < 1e-6);
    let values = delegate.progress_values();
    assert!(values.iter().any(|v| (*v - 0.25).abs() < 1e-6), "got {values:?}");
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    init_tracing();
    let t = Task::builder(CommandTask::new("sleep 30")).tag("sleeper").build();

    let mut group = TaskGroup::new();
    group.add_task(&t).unwrap();

    let handle = Executor::new().submit(&group, ()).unwrap();
    wait_until("sleeper is running", || t.status() == TaskStatus::Running).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(handle.cancel());
    let summary = with_timeout(handle.wait()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(t.status(), TaskStatus::Cancelled);
}

#[tokio::test]
async fn cancellation_is_honoured_while_a_background_process_holds_stdout() {
    init_tracing();
    // The shell exits at once, but `sleep` inherits its stdout.
    let t = Task::builder(CommandTask::new("sleep 10 & echo started"))
        .tag("detached")
        .build();

    let mut group = TaskGroup::new();
    group.add_task(&t).unwrap();

    let handle = Executor::new().submit(&group, ()).unwrap();
    wait_until("detached is running", || t.status() == TaskStatus::Running).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    assert!(handle.cancel());
    let summary = with_timeout(handle.wait()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(t.status(), TaskStatus::Cancelled);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "cancel took {:?}",
        started.elapsed()
    );
}
