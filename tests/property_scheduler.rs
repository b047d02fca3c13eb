use std::collections::HashSet;

use proptest::prelude::*;
use taskgroup::dag::Scheduler;
use taskgroup::engine::{RunOutcome, TaskOutcome};
use taskgroup::{Task, TaskContext, TaskGroup, TaskStatus};

/// Random DAG: task `i` may only depend on tasks `0..i`, so it is acyclic.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps: HashSet<usize> = if i == 0 {
                        HashSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    deps.into_iter().collect()
                })
                .collect()
        })
    })
}

fn build(deps: &[Vec<usize>]) -> (TaskGroup, Vec<Task>) {
    let tasks: Vec<Task> = (0..deps.len())
        .map(|i| {
            Task::builder(|_ctx: TaskContext| async { TaskOutcome::Success })
                .tag(format!("task_{i}"))
                .build()
        })
        .collect();
    let mut group = TaskGroup::new();
    for t in &tasks {
        group.add_task(t).unwrap();
    }
    for (i, ds) in deps.iter().enumerate() {
        for &d in ds {
            group.add_dependency(&tasks[i], &tasks[d]).unwrap();
        }
    }
    (group, tasks)
}

proptest! {
    #[test]
    fn every_task_is_processed_once_and_only_after_its_dependencies(
        deps in dag_strategy(10),
        failing in proptest::collection::hash_set(0..10usize, 0..5),
        picks in proptest::collection::vec(any::<usize>(), 64),
        limit in proptest::option::of(1..4usize),
    ) {
        let (group, tasks) = build(&deps);
        let mut scheduler = Scheduler::new(group.snapshot(1), limit);

        let mut launched: Vec<usize> = Vec::new();
        let mut in_flight: Vec<usize> = Vec::new();
        let mut finished = None;

        let step = scheduler.step_start();
        launched.extend(&step.newly_scheduled);
        in_flight.extend(&step.newly_scheduled);

        let mut pick = picks.iter().cycle();
        while finished.is_none() {
            prop_assert!(!in_flight.is_empty(), "run stalled with nothing in flight");
            if let Some(limit) = limit {
                prop_assert!(in_flight.len() <= limit);
            }

            let idx = in_flight.remove(pick.next().copied().unwrap_or(0) % in_flight.len());
            let outcome = if failing.contains(&idx) {
                TaskOutcome::failed("scripted failure")
            } else {
                TaskOutcome::Success
            };

            let step = scheduler.step_completion(idx, outcome);
            for &next in &step.newly_scheduled {
                prop_assert!(!launched.contains(&next), "task {next} launched twice");
                for &d in &deps[next] {
                    prop_assert!(
                        tasks[d].status().unblocks_dependents(),
                        "task {next} launched before dependency {d} was processed"
                    );
                }
            }
            launched.extend(&step.newly_scheduled);
            in_flight.extend(&step.newly_scheduled);
            finished = step.run_just_finished;

            let mean = tasks.iter().map(|t| t.progress()).sum::<f32>() / tasks.len() as f32;
            prop_assert!((group.progress() - mean).abs() < 1e-5);
        }

        prop_assert_eq!(finished, Some(RunOutcome::Finished));
        prop_assert_eq!(launched.len(), tasks.len());

        let expected_failures = failing.iter().filter(|&&i| i < tasks.len()).count();
        prop_assert_eq!(group.failure_count(), expected_failures);
        for (i, t) in tasks.iter().enumerate() {
            let expected = if failing.contains(&i) { TaskStatus::Failed } else { TaskStatus::Succeeded };
            prop_assert_eq!(t.status(), expected);
        }
    }

    #[test]
    fn group_cancellation_always_concludes_as_cancelled(
        deps in dag_strategy(8),
        completions_before_cancel in 0..8usize,
    ) {
        let (group, tasks) = build(&deps);
        let mut scheduler = Scheduler::new(group.snapshot(1), None);

        let mut in_flight = scheduler.step_start().newly_scheduled;
        for _ in 0..completions_before_cancel {
            let Some(idx) = in_flight.pop() else { break };
            let step = scheduler.step_completion(idx, TaskOutcome::Success);
            prop_assert!(step.run_just_finished.is_none() || in_flight.is_empty());
            if step.run_just_finished.is_some() {
                // Everything ran before the cancel could land.
                return Ok(());
            }
            in_flight.extend(step.newly_scheduled);
        }

        let step = scheduler.step_cancel();
        prop_assert!(step.newly_scheduled.is_empty());
        let mut outcome = step.run_just_finished;
        while let Some(idx) = in_flight.pop() {
            let step = scheduler.step_completion(idx, TaskOutcome::Success);
            prop_assert!(step.newly_scheduled.is_empty());
            outcome = outcome.or(step.run_just_finished);
        }

        prop_assert_eq!(outcome, Some(RunOutcome::Cancelled));
        prop_assert!(tasks.iter().all(|t| t.is_terminal()));
        prop_assert!(tasks
            .iter()
            .all(|t| matches!(t.status(), TaskStatus::Succeeded | TaskStatus::Cancelled)));
    }
}
