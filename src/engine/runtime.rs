// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{Scheduler, SchedulerStep};
use crate::errors::Result;
use crate::exec::task_runner::{self, ActiveTask};

use super::{RunOutcome, RunSummary, RuntimeEvent, TaskGroupDelegate};

/// Drives one group run in response to `RuntimeEvent`s.
///
/// This is a pure IO shell around [`Scheduler`], which contains all the
/// scheduling semantics. This struct reads events from the run's channel,
/// spawns task bodies, signals cancellation to them and forwards lifecycle
/// notifications to the delegate. Because it is the only consumer of the
/// channel, delegate calls are naturally serialized.
pub struct Runtime<D: TaskGroupDelegate> {
    scheduler: Scheduler,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    event_tx: mpsc::UnboundedSender<RuntimeEvent>,
    delegate: D,
    active: HashMap<usize, ActiveTask>,
}

impl<D: TaskGroupDelegate> fmt::Debug for Runtime<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

impl<D: TaskGroupDelegate> Runtime<D> {
    pub fn new(
        scheduler: Scheduler,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        event_tx: mpsc::UnboundedSender<RuntimeEvent>,
        delegate: D,
    ) -> Self {
        Self {
            scheduler,
            event_rx,
            event_tx,
            delegate,
            active: HashMap::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Announces the run to the delegate and launches root tasks.
    /// - Feeds every received event into the scheduler.
    /// - Executes the returned step (spawn, cancel, notify).
    /// - Returns once the scheduler reports that the run is over.
    pub async fn run(mut self) -> Result<RunSummary> {
        let run_id = self.scheduler.plan().run_id();
        info!(
            run_id,
            group = %self.scheduler.plan().group_id(),
            tasks = self.scheduler.plan().len(),
            "task group run started"
        );

        self.delegate.has_started_processing(self.scheduler.plan());

        let step = self.scheduler.step_start();
        if let Some(summary) = self.apply_step(step) {
            return Ok(summary);
        }

        loop {
            let Some(event) = self.event_rx.recv().await else {
                // Unreachable while we hold `event_tx`, but keep the loop
                // total.
                warn!(run_id, "runtime event channel closed before the run ended");
                return Err(anyhow!("event channel of run {run_id} closed unexpectedly").into());
            };

            debug!(?event, run_id, "runtime received event");

            let step = match event {
                RuntimeEvent::TaskProgressed { index, progress } => {
                    self.scheduler.step_progress(index, progress)
                }
                RuntimeEvent::TaskCompleted { index, outcome } => {
                    self.active.remove(&index);
                    self.scheduler.step_completion(index, outcome)
                }
                RuntimeEvent::CancelRequested => self.scheduler.step_cancel(),
                RuntimeEvent::TaskCancelRequested { task } => {
                    match self.scheduler.plan().index_by_id(task) {
                        Some(index) => self.scheduler.step_cancel_task(index),
                        None => {
                            warn!(%task, run_id, "cancel requested for task outside this run");
                            SchedulerStep::default()
                        }
                    }
                }
            };

            if let Some(summary) = self.apply_step(step) {
                return Ok(summary);
            }
        }
    }

    /// Execute a single step returned by the scheduler.
    ///
    /// Returns the run summary if the step concluded the run.
    fn apply_step(&mut self, step: SchedulerStep) -> Option<RunSummary> {
        for index in &step.newly_cancelled {
            if let Some(active) = self.active.get(index) {
                active.request_cancel();
            }
        }

        self.spawn_ready(&step.newly_scheduled);

        if step.aggregates_changed {
            self.delegate.progress_updated(self.scheduler.plan());
        }

        let outcome = step.run_just_finished?;
        Some(self.finish(outcome))
    }

    fn spawn_ready(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }

        let plan = self.scheduler.plan();
        let labels: Vec<_> = indices
            .iter()
            .filter_map(|&i| plan.task(i).map(|t| t.label()))
            .collect();
        debug!(?labels, run_id = plan.run_id(), "spawning ready tasks");

        for &index in indices {
            let Some(task) = plan.task(index).cloned() else {
                continue;
            };
            let active =
                task_runner::spawn_task(task, index, plan.run_id(), self.event_tx.clone());
            self.active.insert(index, active);
        }
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunSummary {
        let plan = self.scheduler.plan();

        // Tasks become reusable before the group reports that it stopped.
        for task in plan.tasks() {
            task.leave_run(plan.group_id());
        }
        // Flags first, so the terminal notification observes the final state.
        plan.status().end_run(outcome);

        match outcome {
            RunOutcome::Finished => self.delegate.has_been_processed(plan),
            RunOutcome::Cancelled => self.delegate.has_been_cancelled(plan),
        }

        let summary = RunSummary {
            run_id: plan.run_id(),
            outcome,
            progress: plan.progress(),
            failure_count: plan.failure_count(),
            task_count: plan.len(),
        };
        info!(
            run_id = summary.run_id,
            ?outcome,
            progress = summary.progress,
            failures = summary.failure_count,
            "task group run ended"
        );
        summary
    }
}
