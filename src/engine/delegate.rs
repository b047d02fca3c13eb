// src/engine/delegate.rs

//! Observer interface for group lifecycle notifications.

use std::sync::Arc;

use tracing::{info, warn};

use crate::group::RunPlan;

/// Receives lifecycle notifications of a group run.
///
/// Every method has a no-op default, so implementors only override what they
/// care about. All calls come from the run's single coordinating loop, in
/// this order:
///
/// 1. `has_started_processing`, exactly once;
/// 2. `progress_updated`, zero or more times;
/// 3. `has_been_processed` *or* `has_been_cancelled`, exactly once.
///
/// When the terminal notification fires, the group status already reports
/// `finished` (or `cancelled`) and is no longer running.
pub trait TaskGroupDelegate: Send + 'static {
    fn has_started_processing(&self, _group: &RunPlan) {}

    /// Group progress, failure count or a task status changed.
    fn progress_updated(&self, _group: &RunPlan) {}

    /// Every task was processed. Inspect `failure_count` or the tasks
    /// themselves for individual outcomes.
    fn has_been_processed(&self, _group: &RunPlan) {}

    fn has_been_cancelled(&self, _group: &RunPlan) {}
}

/// No-op delegate.
impl TaskGroupDelegate for () {}

impl<D> TaskGroupDelegate for Arc<D>
where
    D: TaskGroupDelegate + Sync + ?Sized,
{
    fn has_started_processing(&self, group: &RunPlan) {
        (**self).has_started_processing(group)
    }

    fn progress_updated(&self, group: &RunPlan) {
        (**self).progress_updated(group)
    }

    fn has_been_processed(&self, group: &RunPlan) {
        (**self).has_been_processed(group)
    }

    fn has_been_cancelled(&self, group: &RunPlan) {
        (**self).has_been_cancelled(group)
    }
}

/// Delegate that reports lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDelegate;

impl TaskGroupDelegate for LoggingDelegate {
    fn has_started_processing(&self, group: &RunPlan) {
        info!(
            group = group.tag().unwrap_or("-"),
            run_id = group.run_id(),
            tasks = group.len(),
            "task group started"
        );
    }

    fn progress_updated(&self, group: &RunPlan) {
        info!(
            group = group.tag().unwrap_or("-"),
            run_id = group.run_id(),
            progress = group.progress(),
            failures = group.failure_count(),
            "task group progress"
        );
    }

    fn has_been_processed(&self, group: &RunPlan) {
        if group.failure_count() > 0 {
            for task in group.tasks() {
                if let Some(detail) = task.failure() {
                    warn!(task = %task.label(), error = %detail, "task failed");
                }
            }
        }
        info!(
            group = group.tag().unwrap_or("-"),
            run_id = group.run_id(),
            failures = group.failure_count(),
            "task group processed"
        );
    }

    fn has_been_cancelled(&self, group: &RunPlan) {
        warn!(
            group = group.tag().unwrap_or("-"),
            run_id = group.run_id(),
            progress = group.progress(),
            "task group cancelled"
        );
    }
}
