// src/task.rs

//! Tasks: the unit of work scheduled by a task group.
//!
//! A [`Task`] is a cheap, cloneable handle. Two handles are equal only if they
//! point at the same task. What a task actually does is supplied by the caller
//! as a [`TaskPayload`]; the scheduler only drives the task's status through
//! its state machine:
//!
//! ```text
//! Idle -> Running -> Succeeded | Failed
//!   \        \
//!    +--------+---> Cancelled
//! ```
//!
//! The first terminal transition wins. It is guarded by an atomic latch so a
//! completion signal that races with cancellation can never flip a
//! `Cancelled` task back to `Succeeded`/`Failed`.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::{Result, TaskGroupError};
use crate::types::{FailureDetail, GroupId, TaskId, TaskStatus, UserInfo};

/// Future returned by [`TaskPayload::run`].
pub type PayloadFuture<'a> = Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;

/// The caller-supplied body of a task.
///
/// The executor calls `run` once per run of the task. The returned future
/// must resolve to exactly one [`TaskOutcome`]. Progress is reported through
/// the [`TaskContext`], which also tells the body when cancellation was
/// requested; stopping early is cooperative.
///
/// Any `Fn(TaskContext) -> impl Future<Output = TaskOutcome>` closure is a
/// payload.
pub trait TaskPayload: Send + Sync + 'static {
    fn run(&self, ctx: TaskContext) -> PayloadFuture<'_>;
}

impl<F, Fut> TaskPayload for F
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    fn run(&self, ctx: TaskContext) -> PayloadFuture<'_> {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    progress: f32,
    failure: Option<FailureDetail>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            progress: 0.0,
            failure: None,
        }
    }
}

struct TaskInner {
    id: TaskId,
    tag: Option<String>,
    user_info: UserInfo,
    payload: Arc<dyn TaskPayload>,
    state: Mutex<TaskState>,
    /// Set by the first terminal transition of the current run.
    terminal: AtomicBool,
    /// Group currently owning this task, if any.
    owner: Mutex<Option<GroupId>>,
    /// Group whose active run holds this task, if any. Outlives ownership:
    /// a dropped group's run keeps driving the task until it ends.
    held_by_run: Mutex<Option<GroupId>>,
}

/// Handle to a schedulable unit of work.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

/// Builder for a [`Task`] with optional tag and user info.
pub struct TaskBuilder {
    tag: Option<String>,
    user_info: UserInfo,
    payload: Arc<dyn TaskPayload>,
}

impl TaskBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn user_info(mut self, user_info: UserInfo) -> Self {
        self.user_info = user_info;
        self
    }

    pub fn build(self) -> Task {
        Task {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                tag: self.tag,
                user_info: self.user_info,
                payload: self.payload,
                state: Mutex::new(TaskState::default()),
                terminal: AtomicBool::new(false),
                owner: Mutex::new(None),
                held_by_run: Mutex::new(None),
            }),
        }
    }
}

impl Task {
    /// Create an untagged task around the given payload.
    pub fn new(payload: impl TaskPayload) -> Self {
        Self::builder(payload).build()
    }

    /// Create an untagged task from an async closure.
    ///
    /// Same as [`Task::new`], but lets the compiler infer the closure's
    /// argument type.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        Self::new(f)
    }

    pub fn builder(payload: impl TaskPayload) -> TaskBuilder {
        TaskBuilder {
            tag: None,
            user_info: UserInfo::new(),
            payload: Arc::new(payload),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn tag(&self) -> Option<&str> {
        self.inner.tag.as_deref()
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.inner.user_info
    }

    pub fn status(&self) -> TaskStatus {
        self.state().status
    }

    /// Last accepted progress value, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.state().progress
    }

    /// Failure detail; present iff the status is `Failed`.
    pub fn failure(&self) -> Option<FailureDetail> {
        self.state().failure.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Human readable label for logs and error messages.
    pub fn label(&self) -> String {
        match self.tag() {
            Some(tag) => format!("{tag} ({})", self.inner.id),
            None => self.inner.id.to_string(),
        }
    }

    pub(crate) fn payload(&self) -> Arc<dyn TaskPayload> {
        Arc::clone(&self.inner.payload)
    }

    fn state(&self) -> MutexGuard<'_, TaskState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Put the task back into `Idle` for a new run.
    pub(crate) fn reset(&self) {
        let mut state = self.state();
        *state = TaskState::default();
        self.inner.terminal.store(false, Ordering::SeqCst);
    }

    /// `Idle -> Running`. Returns `false` if the task was not idle.
    pub(crate) fn mark_running(&self) -> bool {
        let mut state = self.state();
        if state.status != TaskStatus::Idle {
            return false;
        }
        state.status = TaskStatus::Running;
        true
    }

    /// Apply a progress report. Accepted only while running; values are
    /// clamped into `[0, 1]` and never move backwards.
    ///
    /// Returns `true` if the stored progress changed.
    pub(crate) fn apply_progress(&self, progress: f32) -> bool {
        let mut state = self.state();
        if state.status != TaskStatus::Running {
            debug!(task = %self.label(), status = %state.status, progress, "discarding progress for task that is not running");
            return false;
        }
        if progress.is_nan() {
            return false;
        }
        let progress = progress.clamp(0.0, 1.0);
        if progress <= state.progress {
            return false;
        }
        state.progress = progress;
        true
    }

    /// `Running -> Succeeded | Failed`.
    ///
    /// Returns `false` (and changes nothing) if the task already reached a
    /// terminal state, e.g. because it was cancelled first.
    pub(crate) fn complete(&self, outcome: &TaskOutcome) -> bool {
        let mut state = self.state();
        if state.status != TaskStatus::Running || !self.latch_terminal() {
            return false;
        }
        match outcome {
            TaskOutcome::Success => {
                state.status = TaskStatus::Succeeded;
                state.progress = 1.0;
            }
            TaskOutcome::Failed(detail) => {
                state.status = TaskStatus::Failed;
                state.failure = Some(detail.clone());
            }
        }
        true
    }

    /// Any non-terminal state -> `Cancelled`.
    ///
    /// Returns the status the task had before, or `None` if it was already
    /// terminal.
    pub(crate) fn cancel(&self) -> Option<TaskStatus> {
        let mut state = self.state();
        if state.status.is_terminal() || !self.latch_terminal() {
            return None;
        }
        let previous = state.status;
        state.status = TaskStatus::Cancelled;
        Some(previous)
    }

    fn latch_terminal(&self) -> bool {
        self.inner
            .terminal
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Record `group` as the owner of this task.
    ///
    /// Claiming a task already owned by the same group is a no-op.
    pub(crate) fn claim(&self, group: GroupId) -> Result<()> {
        let mut owner = self
            .inner
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *owner {
            Some(current) if current != group => Err(TaskGroupError::TaskInAnotherGroup(
                format!("{} is owned by {}", self.label(), current),
            )),
            _ => {
                *owner = Some(group);
                Ok(())
            }
        }
    }

    /// Mark the task as held by an active run of `group`.
    ///
    /// Fails with `TaskBusy` while any run, including an earlier one of the
    /// same group, still holds it.
    pub(crate) fn enter_run(&self, group: GroupId) -> Result<()> {
        let mut held = self
            .inner
            .held_by_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = *held {
            return Err(TaskGroupError::TaskBusy(format!(
                "{} is still held by an active run of {}",
                self.label(),
                current
            )));
        }
        *held = Some(group);
        Ok(())
    }

    pub(crate) fn leave_run(&self, group: GroupId) {
        let mut held = self
            .inner
            .held_by_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *held == Some(group) {
            *held = None;
        }
    }

    pub(crate) fn release(&self, group: GroupId) {
        let mut owner = self
            .inner
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *owner == Some(group) {
            *owner = None;
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("status", &state.status)
            .field("progress", &state.progress)
            .finish_non_exhaustive()
    }
}

/// Handle given to a running task body.
///
/// It is the only channel through which a task talks back to the executor.
#[derive(Clone)]
pub struct TaskContext {
    task: Task,
    index: usize,
    run_id: u64,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    cancel: watch::Receiver<bool>,
}

impl TaskContext {
    pub(crate) fn new(
        task: Task,
        index: usize,
        run_id: u64,
        events: mpsc::UnboundedSender<RuntimeEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            task,
            index,
            run_id,
            events,
            cancel,
        }
    }

    /// The task this body is running for.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Identifier of the group run this invocation belongs to.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Report progress in `[0, 1]`.
    ///
    /// Reports are applied in the order they are sent. Reports arriving after
    /// the task reached a terminal state are discarded.
    pub fn report_progress(&self, progress: f32) {
        let event = RuntimeEvent::TaskProgressed {
            index: self.index,
            progress,
        };
        if self.events.send(event).is_err() {
            debug!(
                task = %self.task.label(),
                run_id = self.run_id,
                "progress reported after the run ended; ignoring"
            );
        }
    }

    /// Whether cancellation of this task has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once cancellation of this task has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        // An error means the executor dropped the sender, which only
        // happens once the run is being torn down: treat it as cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task.id())
            .field("index", &self.index)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
