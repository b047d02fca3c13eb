// src/engine/executor.rs

//! Public entry point: submit task groups and cancel them.

use anyhow::anyhow;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::Scheduler;
use crate::errors::{Result, TaskGroupError};
use crate::group::{RunPlan, TaskGroup};
use crate::task::Task;

use super::runtime::Runtime;
use super::{ExecutorOptions, RunSummary, RuntimeEvent, TaskGroupDelegate};

/// Runs task groups on the ambient Tokio runtime.
///
/// The executor itself is stateless apart from its options: every submitted
/// group gets its own coordinating task and event channel, so several groups
/// can run concurrently.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    options: ExecutorOptions,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExecutorOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Start running `group`.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately; the
    /// run proceeds in the background and reports to `delegate`.
    ///
    /// Errors:
    /// - `NoRuntime` outside a Tokio runtime;
    /// - `AlreadyRunning` if the group has an active run;
    /// - `TaskBusy` if a member task is still held by an unfinished run, for
    ///   example one of another group it was moved out of.
    pub fn submit<D: TaskGroupDelegate>(&self, group: &TaskGroup, delegate: D) -> Result<RunHandle> {
        let handle = Handle::try_current().map_err(|_| TaskGroupError::NoRuntime)?;

        if group.is_running() {
            return Err(TaskGroupError::AlreadyRunning(format!(
                "{} already has an active run",
                group.id()
            )));
        }
        let members = group.tasks();
        for (held, task) in members.iter().enumerate() {
            if let Err(err) = task.enter_run(group.id()) {
                for claimed in &members[..held] {
                    claimed.leave_run(group.id());
                }
                return Err(err);
            }
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let Some(run_id) = group.status().begin_run(event_tx.clone()) else {
            for task in members {
                task.leave_run(group.id());
            }
            return Err(TaskGroupError::AlreadyRunning(format!(
                "{} already has an active run",
                group.id()
            )));
        };

        for task in members {
            task.reset();
        }
        let plan = group.snapshot(run_id);

        info!(
            group = %group.id(),
            run_id,
            tasks = plan.len(),
            max_concurrent = ?self.options.max_concurrent_tasks,
            "submitting task group"
        );

        let scheduler = Scheduler::new(plan.clone(), self.options.max_concurrent_tasks);
        let runtime = Runtime::new(scheduler, event_rx, event_tx, delegate);
        let join = handle.spawn(runtime.run());

        Ok(RunHandle { plan, join })
    }

    /// Request cancellation of `group`'s active run.
    ///
    /// Returns `false` if the group is not running. Completion is reported
    /// through the delegate's `has_been_cancelled`.
    pub fn cancel(&self, group: &TaskGroup) -> bool {
        let accepted = group.cancel();
        debug!(group = %group.id(), accepted, "cancel requested through executor");
        accepted
    }
}

/// Handle to one submitted run.
///
/// Dropping the handle does not cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    plan: RunPlan,
    join: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    pub fn run_id(&self) -> u64 {
        self.plan.run_id()
    }

    /// The snapshot this run executes.
    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Cancel this run. Returns `false` if it already ended.
    pub fn cancel(&self) -> bool {
        self.plan.status().cancel_run(Some(self.plan.run_id()))
    }

    /// Cancel one member task and, transitively, its dependents.
    ///
    /// Returns `Ok(false)` if the run already ended.
    pub fn cancel_task(&self, task: &Task) -> Result<bool> {
        if self.plan.index_of(task).is_none() {
            return Err(TaskGroupError::UnknownTask(format!(
                "{} is not part of run {}",
                task.label(),
                self.plan.run_id()
            )));
        }
        Ok(self.plan.status().send_control(
            self.plan.run_id(),
            RuntimeEvent::TaskCancelRequested { task: task.id() },
        ))
    }

    /// Whether the coordinating task has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> Result<RunSummary> {
        match self.join.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow!("run {} aborted: {join_err}", self.plan.run_id()).into()),
        }
    }
}
