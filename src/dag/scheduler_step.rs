// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::engine::RunOutcome;

/// Structured result of a single scheduler "step".
///
/// Task references are indices into the run plan. The async runtime turns a
/// step into side effects (spawning, cancel signals, delegate calls); tests
/// can drive the scheduler by hand and assert on the steps directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStep {
    /// Tasks that were marked `Running` and must be launched now.
    pub newly_scheduled: Vec<usize>,
    /// Tasks that were moved to `Cancelled` in this step. Those that were
    /// running must be told to stop.
    pub newly_cancelled: Vec<usize>,
    /// Whether group progress, failure count or any task status changed.
    pub aggregates_changed: bool,
    /// Set when this step concluded the run.
    pub run_just_finished: Option<RunOutcome>,
}

impl SchedulerStep {
    pub fn is_empty(&self) -> bool {
        self.newly_scheduled.is_empty()
            && self.newly_cancelled.is_empty()
            && !self.aggregates_changed
            && self.run_just_finished.is_none()
    }
}
