use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::scheduler_step::SchedulerStep;
use crate::engine::{RunOutcome, TaskOutcome};
use crate::group::RunPlan;
use crate::types::{TaskId, TaskStatus};

/// Scheduler holds one run plan plus the mutable per-run bookkeeping.
///
/// It is responsible for:
/// - deciding when a task is "ready" to run (all dependencies fully processed)
/// - marking tasks as running/succeeded/failed/cancelled
/// - keeping group progress and failure count current
/// - deciding when the run is over, and with which outcome
///
/// It has no channels, no Tokio types, and performs no IO. Every method
/// returns a [`SchedulerStep`] describing what the async shell should do.
#[derive(Debug)]
pub struct Scheduler {
    plan: RunPlan,
    /// Tasks whose body has been launched and has not reported back yet.
    ///
    /// A cancelled task stays in flight until its completion signal confirms
    /// that it actually stopped.
    in_flight: Vec<bool>,
    cancel_requested: bool,
    max_concurrent: Option<usize>,
    done: bool,
}

impl Scheduler {
    pub fn new(plan: RunPlan, max_concurrent: Option<usize>) -> Self {
        let in_flight = vec![false; plan.len()];
        Self {
            plan,
            in_flight,
            cancel_requested: false,
            max_concurrent,
            done: false,
        }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Whether the run has concluded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn status_of(&self, index: usize) -> Option<TaskStatus> {
        self.plan.task(index).map(|task| task.status())
    }

    pub fn is_in_flight(&self, index: usize) -> bool {
        self.in_flight.get(index).copied().unwrap_or(false)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.iter().filter(|f| **f).count()
    }

    /// Idle tasks whose dependencies have all been fully processed, in plan
    /// order.
    pub fn ready_tasks(&self) -> Vec<usize> {
        let statuses: HashMap<TaskId, TaskStatus> = self
            .plan
            .tasks()
            .iter()
            .map(|task| (task.id(), task.status()))
            .collect();

        let mut ready: Vec<usize> = self
            .plan
            .graph()
            .ready_tasks(&statuses)
            .into_iter()
            .filter_map(|id| self.plan.index_by_id(id))
            .filter(|&index| self.plan.tasks()[index].status() == TaskStatus::Idle)
            .collect();
        ready.sort_unstable();
        ready
    }

    /// First step of a run: publish initial aggregates and launch every
    /// task without dependencies.
    pub fn step_start(&mut self) -> SchedulerStep {
        debug!(
            run_id = self.plan.run_id(),
            tasks = self.plan.len(),
            "scheduler: starting run"
        );
        self.publish_aggregates();

        if self.plan.status().is_cancel_requested() {
            return self.step_cancel();
        }

        SchedulerStep {
            newly_scheduled: self.launch_ready(),
            run_just_finished: self.maybe_finish_run(),
            ..SchedulerStep::default()
        }
    }

    /// A running task reported progress.
    pub fn step_progress(&mut self, index: usize, progress: f32) -> SchedulerStep {
        let Some(task) = self.plan.task(index) else {
            warn!(index, "progress from unknown task index; ignoring");
            return SchedulerStep::default();
        };

        if !task.apply_progress(progress) {
            return SchedulerStep::default();
        }

        self.publish_aggregates();
        SchedulerStep {
            aggregates_changed: true,
            ..SchedulerStep::default()
        }
    }

    /// A task body returned.
    ///
    /// For a task that was cancelled in the meantime this only confirms that
    /// it stopped; its `Cancelled` status is kept.
    pub fn step_completion(&mut self, index: usize, outcome: TaskOutcome) -> SchedulerStep {
        let Some(task) = self.plan.task(index).cloned() else {
            warn!(index, "completion from unknown task index; ignoring");
            return SchedulerStep::default();
        };

        if let Some(flag) = self.in_flight.get_mut(index) {
            *flag = false;
        }

        let mut step = SchedulerStep::default();

        if task.complete(&outcome) {
            match &outcome {
                TaskOutcome::Success => {
                    debug!(task = %task.label(), run_id = self.plan.run_id(), "task completed successfully");
                }
                TaskOutcome::Failed(detail) => {
                    warn!(
                        task = %task.label(),
                        run_id = self.plan.run_id(),
                        error = %detail,
                        "task failed; dependents still run"
                    );
                }
            }
            self.publish_aggregates();
            step.aggregates_changed = true;
        } else {
            debug!(
                task = %task.label(),
                run_id = self.plan.run_id(),
                status = %task.status(),
                "discarding completion of task that is already terminal"
            );
        }

        // Intent may be recorded on the group before its event reaches us;
        // it must win over a run that would otherwise finish normally.
        if !self.cancel_requested && self.plan.status().is_cancel_requested() {
            let cancel = self.step_cancel();
            step.newly_cancelled = cancel.newly_cancelled;
            step.aggregates_changed |= cancel.aggregates_changed;
            step.run_just_finished = cancel.run_just_finished;
        }

        // A freed slot or a newly processed dependency may unblock others.
        step.newly_scheduled = self.launch_ready();
        if step.run_just_finished.is_none() {
            step.run_just_finished = self.maybe_finish_run();
        }
        step
    }

    /// Group cancellation: every non-terminal task becomes `Cancelled` and
    /// nothing else is launched. The run ends once all in-flight bodies have
    /// reported back.
    pub fn step_cancel(&mut self) -> SchedulerStep {
        if self.done || self.cancel_requested {
            return SchedulerStep::default();
        }
        self.cancel_requested = true;

        info!(
            run_id = self.plan.run_id(),
            in_flight = self.in_flight_count(),
            "scheduler: cancellation requested"
        );

        let newly_cancelled: Vec<usize> = self
            .plan
            .tasks()
            .iter()
            .enumerate()
            .filter_map(|(index, task)| task.cancel().map(|_| index))
            .collect();

        let aggregates_changed = !newly_cancelled.is_empty();
        if aggregates_changed {
            self.publish_aggregates();
        }

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_cancelled,
            aggregates_changed,
            run_just_finished: self.maybe_finish_run(),
        }
    }

    /// Cancel a single task together with everything that (transitively)
    /// depends on it, since those can never become ready.
    ///
    /// Unrelated tasks keep running, but the run then concludes as
    /// `Cancelled`.
    pub fn step_cancel_task(&mut self, index: usize) -> SchedulerStep {
        if self.done {
            return SchedulerStep::default();
        }
        let Some(task) = self.plan.task(index).cloned() else {
            warn!(index, "cancel for unknown task index; ignoring");
            return SchedulerStep::default();
        };

        let mut newly_cancelled = Vec::new();
        if task.cancel().is_some() {
            info!(task = %task.label(), run_id = self.plan.run_id(), "task cancelled");
            newly_cancelled.push(index);
            newly_cancelled.extend(self.cancel_dependents(task.id()));
        }

        let aggregates_changed = !newly_cancelled.is_empty();
        if aggregates_changed {
            self.publish_aggregates();
        }

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_cancelled,
            aggregates_changed,
            run_just_finished: self.maybe_finish_run(),
        }
    }

    /// Mark all non-terminal dependents (and their dependents) of a cancelled
    /// task as `Cancelled`. Returns their indices.
    fn cancel_dependents(&mut self, cancelled: TaskId) -> Vec<usize> {
        let mut stack = self.plan.graph().dependents_of(cancelled);
        let mut visited = HashSet::new();
        let mut newly_cancelled = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(index) = self.plan.index_by_id(id) else {
                continue;
            };
            if self.plan.tasks()[index].cancel().is_some() {
                debug!(
                    task = %self.plan.tasks()[index].label(),
                    "cancelling dependent of cancelled task"
                );
                newly_cancelled.push(index);
            }
            stack.extend(self.plan.graph().dependents_of(id));
        }

        newly_cancelled
    }

    /// Collect ready tasks, mark them `Running` (respecting the concurrency
    /// limit) and return their indices.
    fn launch_ready(&mut self) -> Vec<usize> {
        if self.done || self.cancel_requested || self.plan.status().is_cancel_requested() {
            return Vec::new();
        }

        let mut capacity = match self.max_concurrent {
            Some(limit) => limit.saturating_sub(self.in_flight_count()),
            None => usize::MAX,
        };

        let mut launched = Vec::new();
        for index in self.ready_tasks() {
            if capacity == 0 {
                break;
            }
            let task = &self.plan.tasks()[index];
            if task.mark_running() {
                info!(
                    task = %task.label(),
                    run_id = self.plan.run_id(),
                    "dependencies processed; launching task"
                );
                self.in_flight[index] = true;
                capacity -= 1;
                launched.push(index);
            }
        }
        launched
    }

    /// Recompute mean progress and failure count and publish them on the
    /// group status.
    fn publish_aggregates(&self) {
        let tasks = self.plan.tasks();
        let progress = if tasks.is_empty() {
            1.0
        } else {
            let sum: f64 = tasks.iter().map(|task| f64::from(task.progress())).sum();
            (sum / tasks.len() as f64) as f32
        };
        let failures = tasks
            .iter()
            .filter(|task| task.status() == TaskStatus::Failed)
            .count();

        self.plan.status().update_aggregates(progress, failures);
    }

    /// Conclude the run if every task is terminal and nothing is in flight.
    fn maybe_finish_run(&mut self) -> Option<RunOutcome> {
        if self.done {
            return None;
        }

        let all_terminal = self.plan.tasks().iter().all(|task| task.is_terminal());
        if !all_terminal || self.in_flight_count() > 0 {
            return None;
        }

        self.done = true;
        // `Finished` promises every member succeeded or failed, so a single
        // cancelled task turns the whole run into a cancelled one.
        let any_cancelled = self
            .plan
            .tasks()
            .iter()
            .any(|task| task.status() == TaskStatus::Cancelled);
        let outcome = if self.cancel_requested || any_cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Finished
        };
        info!(
            run_id = self.plan.run_id(),
            ?outcome,
            failures = self.plan.status().failure_count(),
            "scheduler: all tasks terminal; run is over"
        );
        Some(outcome)
    }
}
