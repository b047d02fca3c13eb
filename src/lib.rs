// src/lib.rs

//! Dependency-aware execution of task groups.
//!
//! Callers build [`Task`]s around async bodies, collect them in a
//! [`TaskGroup`] together with "runs after" dependencies, and submit the
//! group to an [`Executor`]. A task starts once every dependency has been
//! fully processed (succeeded *or* failed); independent tasks run
//! concurrently. A [`TaskGroupDelegate`] observes start, aggregate progress,
//! completion and cancellation of the run.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod group;
pub mod logging;
pub mod task;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{GroupFile, LoadedGroup, build_group, load_and_validate};

pub use crate::engine::{
    Executor, ExecutorOptions, LoggingDelegate, RunHandle, RunOutcome, RunSummary,
    TaskGroupDelegate, TaskOutcome,
};
pub use crate::errors::TaskGroupError;
pub use crate::exec::CommandTask;
pub use crate::group::{GroupStatus, RunPlan, TaskGroup};
pub use crate::task::{PayloadFuture, Task, TaskBuilder, TaskContext, TaskPayload};
pub use crate::types::{FailureDetail, GroupId, TaskId, TaskStatus, UserInfo};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - group file loading
/// - executor submission with a logging delegate
/// - Ctrl-C handling (cancels the run)
///
/// Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunSummary>> {
    let file = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&file);
        return Ok(None);
    }

    let LoadedGroup {
        group,
        tasks,
        options,
    } = build_group(&file)?;
    let executor = Executor::with_options(options)?;

    let handle = executor.submit(&group, LoggingDelegate)?;

    // Ctrl-C → cancel the run; the run itself decides when it is over.
    {
        let status = Arc::clone(group.status());
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling task group");
            status.cancel();
        });
    }

    let summary = handle.wait().await?;

    println!(
        "{}: {:?}, progress {:.0}%, {} of {} task(s) failed",
        group.tag().unwrap_or("taskgroup"),
        summary.outcome,
        summary.progress * 100.0,
        summary.failure_count,
        summary.task_count
    );
    for (name, task) in tasks.iter() {
        match task.failure() {
            Some(detail) => println!("  - {name}: {} ({detail})", task.status()),
            None => println!("  - {name}: {}", task.status()),
        }
    }

    Ok(Some(summary))
}

/// Simple dry-run output: print group settings, tasks, deps and commands.
fn print_dry_run(file: &GroupFile) {
    println!("taskgroup dry-run");
    if let Some(tag) = file.group.tag.as_deref() {
        println!("  group.tag = {tag:?}");
    }
    match file.group.max_concurrent_tasks {
        Some(limit) => println!("  group.max_concurrent_tasks = {limit}"),
        None => println!("  group.max_concurrent_tasks = unlimited"),
    }
    println!();

    println!("tasks ({}):", file.task.len());
    for (name, task) in file.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(ref s) = task.progress_on_stdout {
            println!("      progress_on_stdout: {s}");
        }
    }

    debug!("dry-run complete (no execution)");
}
