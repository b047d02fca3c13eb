// src/exec/task_runner.rs

//! Individual task body runner.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::task::{Task, TaskContext};

/// Runtime-side handle of a spawned task body.
#[derive(Debug)]
pub struct ActiveTask {
    cancel: watch::Sender<bool>,
}

impl ActiveTask {
    /// Ask the body to stop. Idempotent.
    pub fn request_cancel(&self) {
        self.cancel.send_replace(true);
    }
}

/// Run a single task body on the Tokio runtime, emitting exactly one
/// `TaskCompleted` event when it returns.
///
/// - The body receives a [`TaskContext`] for progress and cancellation.
/// - A panicking body is reported as a failure instead of tearing down the
///   run.
/// - Completion is sent even for cancelled tasks: it is how the scheduler
///   learns that the body actually stopped.
pub fn spawn_task(
    task: Task,
    index: usize,
    run_id: u64,
    events: mpsc::UnboundedSender<RuntimeEvent>,
) -> ActiveTask {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctx = TaskContext::new(task.clone(), index, run_id, events.clone(), cancel_rx);

    tokio::spawn(async move {
        let label = task.label();
        info!(task = %label, run_id, "starting task body");

        let payload = task.payload();
        let body = tokio::spawn(async move { payload.run(ctx).await });

        let outcome = match body.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(task = %label, run_id, error = %join_err, "task body panicked");
                TaskOutcome::failed(format!("task body panicked: {join_err}"))
            }
        };

        debug!(task = %label, run_id, success = outcome.is_success(), "task body returned");

        if events
            .send(RuntimeEvent::TaskCompleted { index, outcome })
            .is_err()
        {
            debug!(task = %label, run_id, "run already ended; dropping completion");
        }
    });

    ActiveTask { cancel: cancel_tx }
}
