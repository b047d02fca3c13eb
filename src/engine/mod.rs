// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the public [`Executor`] entry point (`submit` / `cancel`)
//! - the [`TaskGroupDelegate`] observer interface
//! - the async runtime loop that reacts to:
//!   - task progress reports
//!   - task completion signals
//!   - cancellation requests
//!
//! The pure scheduling state machine lives in [`crate::dag::scheduler`]; the
//! async/IO shell is implemented in [`runtime`].

use crate::errors::{Result, TaskGroupError};
use crate::types::{FailureDetail, TaskId};

/// Terminal signal of a task body.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success,
    Failed(FailureDetail),
}

impl TaskOutcome {
    /// Shorthand for a failure with a plain message.
    pub fn failed<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        TaskOutcome::Failed(FailureDetail::msg(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// How a group run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task was processed and no cancellation was requested.
    Finished,
    /// Cancellation was requested and every in-flight task has stopped.
    Cancelled,
}

/// Options for the [`Executor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound on tasks running at the same time. `None` = unlimited.
    pub max_concurrent_tasks: Option<usize>,
}

impl ExecutorOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == Some(0) {
            return Err(TaskGroupError::InvalidOption(
                "max_concurrent_tasks must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aggregate result of one group run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: u64,
    pub outcome: RunOutcome,
    pub progress: f32,
    pub failure_count: usize,
    pub task_count: usize,
}

/// Events flowing into the runtime of one run.
///
/// Tasks are addressed by their index in the run plan.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A running task reported progress.
    TaskProgressed { index: usize, progress: f32 },
    /// A task body returned.
    TaskCompleted { index: usize, outcome: TaskOutcome },
    /// The whole group should be cancelled.
    CancelRequested,
    /// A single member task should be cancelled.
    TaskCancelRequested { task: TaskId },
}

pub mod delegate;
pub mod executor;
pub mod runtime;

pub use delegate::{LoggingDelegate, TaskGroupDelegate};
pub use executor::{Executor, RunHandle};
pub use runtime::Runtime;
