use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use taskgroup::engine::TaskOutcome;
use taskgroup::group::RunPlan;
use taskgroup::task::{PayloadFuture, TaskContext, TaskPayload};
use taskgroup::{TaskGroupDelegate, TaskStatus};

/// Shared, ordered record of what fake payloads did.
///
/// Entries look like `"start:A"`, `"end:A"` and `"cancelled:A"`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Names of started tasks, in start order.
    pub fn started(&self) -> Vec<String> {
        self.with_prefix("start:")
    }

    pub fn ended(&self) -> Vec<String> {
        self.with_prefix("end:")
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.with_prefix("cancelled:")
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

/// One step of a scripted task body.
#[derive(Debug, Clone)]
pub enum Step {
    /// Report this progress value.
    Progress(f32),
    /// Block until the gate is notified (or the task is cancelled).
    Gate(Arc<Notify>),
    /// Sleep (or stop early on cancellation).
    Sleep(Duration),
}

/// A task body that follows a fixed script.
///
/// - logs `start:<name>` when invoked;
/// - executes its steps in order;
/// - on cancellation while blocked, logs `cancelled:<name>` and returns
///   `Failed("cancelled")` (unless told to ignore cancellation);
/// - otherwise logs `end:<name>` and returns its configured outcome.
#[derive(Debug, Clone)]
pub struct ScriptedPayload {
    name: String,
    steps: Vec<Step>,
    outcome: TaskOutcome,
    log: ExecutionLog,
    honours_cancel: bool,
    panics: bool,
}

impl ScriptedPayload {
    pub fn new(name: &str, log: &ExecutionLog) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
            outcome: TaskOutcome::Success,
            log: log.clone(),
            honours_cancel: true,
            panics: false,
        }
    }

    pub fn progress(mut self, value: f32) -> Self {
        self.steps.push(Step::Progress(value));
        self
    }

    pub fn gate(mut self, gate: &Arc<Notify>) -> Self {
        self.steps.push(Step::Gate(Arc::clone(gate)));
        self
    }

    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Sleep(duration));
        self
    }

    pub fn fails(mut self, message: &str) -> Self {
        self.outcome = TaskOutcome::failed(message.to_string());
        self
    }

    /// Keep blocking through cancellation requests.
    pub fn ignores_cancel(mut self) -> Self {
        self.honours_cancel = false;
        self
    }

    /// Panic after the scripted steps.
    pub fn panics(mut self) -> Self {
        self.panics = true;
        self
    }

    async fn wait_step(&self, ctx: &TaskContext, step: &Step) -> bool {
        let blocking = async {
            match step {
                Step::Gate(gate) => gate.notified().await,
                Step::Sleep(duration) => tokio::time::sleep(*duration).await,
                Step::Progress(_) => {}
            }
        };

        if !self.honours_cancel {
            blocking.await;
            return true;
        }

        tokio::select! {
            _ = blocking => true,
            _ = ctx.cancelled() => false,
        }
    }
}

impl TaskPayload for ScriptedPayload {
    fn run(&self, ctx: TaskContext) -> PayloadFuture<'_> {
        Box::pin(async move {
            self.log.push(format!("start:{}", self.name));

            for step in &self.steps {
                if let Step::Progress(value) = step {
                    ctx.report_progress(*value);
                    tokio::task::yield_now().await;
                    continue;
                }
                if !self.wait_step(&ctx, step).await {
                    self.log.push(format!("cancelled:{}", self.name));
                    return TaskOutcome::failed("cancelled");
                }
            }

            if self.panics {
                panic!("scripted panic in {}", self.name);
            }

            self.log.push(format!("end:{}", self.name));
            self.outcome.clone()
        })
    }
}

/// A delegate notification, with the group state observed at that moment.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Started {
        running: bool,
    },
    Progress {
        progress: f32,
        failures: usize,
    },
    Processed {
        running: bool,
        finished: bool,
        progress: f32,
        failures: usize,
        statuses: Vec<TaskStatus>,
    },
    Cancelled {
        running: bool,
        cancelled: bool,
        statuses: Vec<TaskStatus>,
    },
}

/// Delegate that records every notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelegate {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<f32> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Progress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| matches!(n, Notification::Processed { .. } | Notification::Cancelled { .. }))
            .count()
    }

    fn record(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

fn statuses(group: &RunPlan) -> Vec<TaskStatus> {
    group.tasks().iter().map(|t| t.status()).collect()
}

impl TaskGroupDelegate for RecordingDelegate {
    fn has_started_processing(&self, group: &RunPlan) {
        self.record(Notification::Started {
            running: group.is_running(),
        });
    }

    fn progress_updated(&self, group: &RunPlan) {
        self.record(Notification::Progress {
            progress: group.progress(),
            failures: group.failure_count(),
        });
    }

    fn has_been_processed(&self, group: &RunPlan) {
        self.record(Notification::Processed {
            running: group.is_running(),
            finished: group.is_finished(),
            progress: group.progress(),
            failures: group.failure_count(),
            statuses: statuses(group),
        });
    }

    fn has_been_cancelled(&self, group: &RunPlan) {
        self.record(Notification::Cancelled {
            running: group.is_running(),
            cancelled: group.is_cancelled(),
            statuses: statuses(group),
        });
    }
}
