// src/group/status.rs

//! Live aggregate state of a task group, shared between the caller's
//! [`TaskGroup`](crate::group::TaskGroup) and the executor driving it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{RunOutcome, RuntimeEvent};

#[derive(Debug, Default)]
struct GroupFlags {
    running: bool,
    finished: bool,
    cancelled: bool,
    cancel_requested: bool,
    progress: f32,
    failure_count: usize,
    run_counter: u64,
    /// Event channel of the active run, used to deliver cancellation.
    control: Option<mpsc::UnboundedSender<RuntimeEvent>>,
}

/// Aggregate state of a task group.
///
/// All transitions happen under one lock, so observers never see `running`
/// and `finished` set at the same time.
#[derive(Debug, Default)]
pub struct GroupStatus {
    flags: Mutex<GroupFlags>,
}

impl GroupStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, GroupFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.flags().running
    }

    pub fn is_finished(&self) -> bool {
        self.flags().finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags().cancelled
    }

    /// Whether cancellation was requested for the current (or last) run.
    pub fn is_cancel_requested(&self) -> bool {
        self.flags().cancel_requested
    }

    /// Mean progress of all member tasks, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.flags().progress
    }

    /// Number of member tasks whose terminal status is `Failed`.
    pub fn failure_count(&self) -> usize {
        self.flags().failure_count
    }

    /// Number of runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.flags().run_counter
    }

    /// Enter the running state. Returns the new run id, or `None` if a run
    /// is already active.
    pub(crate) fn begin_run(&self, control: mpsc::UnboundedSender<RuntimeEvent>) -> Option<u64> {
        let mut flags = self.flags();
        if flags.running {
            return None;
        }
        flags.run_counter += 1;
        flags.running = true;
        flags.finished = false;
        flags.cancelled = false;
        flags.cancel_requested = false;
        flags.progress = 0.0;
        flags.failure_count = 0;
        flags.control = Some(control);
        Some(flags.run_counter)
    }

    pub(crate) fn update_aggregates(&self, progress: f32, failure_count: usize) {
        let mut flags = self.flags();
        flags.progress = progress;
        flags.failure_count = failure_count;
    }

    /// Leave the running state with the given outcome.
    pub(crate) fn end_run(&self, outcome: RunOutcome) {
        let mut flags = self.flags();
        flags.running = false;
        flags.control = None;
        match outcome {
            RunOutcome::Finished => flags.finished = true,
            RunOutcome::Cancelled => flags.cancelled = true,
        }
    }

    /// Record cancellation intent for the active run.
    ///
    /// Returns `false` if the group is not running.
    pub fn cancel(&self) -> bool {
        self.cancel_run(None)
    }

    /// Record cancellation intent, optionally only if `run_id` is still the
    /// active run.
    pub(crate) fn cancel_run(&self, run_id: Option<u64>) -> bool {
        let mut flags = self.flags();
        if !flags.running || run_id.is_some_and(|id| id != flags.run_counter) {
            return false;
        }
        if !flags.cancel_requested {
            flags.cancel_requested = true;
            if let Some(control) = flags.control.as_ref() {
                if control.send(RuntimeEvent::CancelRequested).is_err() {
                    debug!("run event channel already closed while cancelling");
                }
            }
        }
        true
    }

    /// Deliver an event to run `run_id`, if it is still active.
    pub(crate) fn send_control(&self, run_id: u64, event: RuntimeEvent) -> bool {
        let flags = self.flags();
        if !flags.running || flags.run_counter != run_id {
            return false;
        }
        match flags.control.as_ref() {
            Some(control) => control.send(event).is_ok(),
            None => false,
        }
    }
}
