// src/exec/command.rs

//! Shell-command task payload.

use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::engine::TaskOutcome;
use crate::errors::{Result, TaskGroupError};
use crate::task::{PayloadFuture, TaskContext, TaskPayload};

/// Runs a shell command as a task body.
///
/// - Exit status 0 is success; anything else fails with "exit code N".
/// - With a progress pattern, every stdout line matching it reports
///   progress: capture group 1 is read as a percentage (`42` -> `0.42`).
/// - Cancellation kills the child process.
#[derive(Debug, Clone)]
pub struct CommandTask {
    cmd: String,
    progress_on_stdout: Option<Regex>,
}

impl CommandTask {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            progress_on_stdout: None,
        }
    }

    /// Attach a progress pattern. Fails with `ConfigError` if the pattern is
    /// not a valid regex.
    pub fn with_progress_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            TaskGroupError::ConfigError(format!("invalid progress_on_stdout regex '{pattern}': {e}"))
        })?;
        self.progress_on_stdout = Some(regex);
        Ok(self)
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<TaskOutcome> {
        let label = ctx.task().label();
        info!(task = %label, run_id = ctx.run_id(), cmd = %self.cmd, "starting task process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task {label}"))?;

        let stdout_monitor = child
            .stdout
            .take()
            .map(|stdout| spawn_stdout_monitor(stdout, self.progress_on_stdout.clone(), ctx.clone()));

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let label = label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %label, "stderr: {}", line);
                }
            });
        }

        let status = tokio::select! {
            status_res = child.wait() => {
                status_res.with_context(|| format!("waiting for process of task {label}"))?
            }

            _ = ctx.cancelled() => {
                info!(
                    task = %label,
                    run_id = ctx.run_id(),
                    "cancellation requested for running task; killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!(task = %label, error = %e, "failed to kill child process on cancellation");
                }
                if let Some(monitor) = stdout_monitor {
                    monitor.abort();
                }
                return Ok(TaskOutcome::failed("cancelled"));
            }
        };

        // Let trailing progress lines land before completion. A background
        // process may keep stdout open past the shell's exit, so keep
        // honouring cancellation meanwhile.
        if let Some(mut monitor) = stdout_monitor {
            tokio::select! {
                joined = &mut monitor => {
                    if let Err(e) = joined {
                        warn!(task = %label, error = %e, "stdout monitor ended abnormally");
                    }
                }

                _ = ctx.cancelled() => {
                    info!(
                        task = %label,
                        run_id = ctx.run_id(),
                        "cancellation requested while stdout is still open; abandoning output"
                    );
                    monitor.abort();
                    return Ok(TaskOutcome::failed("cancelled"));
                }
            }
        }

        let code = status.code().unwrap_or(-1);
        info!(
            task = %label,
            run_id = ctx.run_id(),
            exit_code = code,
            success = status.success(),
            "task process exited"
        );

        if status.success() {
            Ok(TaskOutcome::Success)
        } else {
            Ok(TaskOutcome::failed(format!("exit code {code}")))
        }
    }
}

impl TaskPayload for CommandTask {
    fn run(&self, ctx: TaskContext) -> PayloadFuture<'_> {
        Box::pin(async move {
            match self.execute(ctx).await {
                Ok(outcome) => outcome,
                Err(err) => TaskOutcome::Failed(err.into()),
            }
        })
    }
}

fn spawn_stdout_monitor(
    stdout: ChildStdout,
    progress: Option<Regex>,
    ctx: TaskContext,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let label = ctx.task().label();
        let mut lines = BufReader::new(stdout).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task = %label, "stdout: {}", line);

            let Some(re) = progress.as_ref() else {
                continue;
            };
            if let Some(percent) = parse_progress(re, &line) {
                ctx.report_progress(percent / 100.0);
            }
        }
    })
}

/// Extract a percentage from `line` using capture group 1 of `re`.
fn parse_progress(re: &Regex, line: &str) -> Option<f32> {
    let caps = re.captures(line)?;
    let raw = caps.get(1)?.as_str().trim();
    match raw.parse::<f32>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(value = raw, "progress capture is not a number; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percentage_from_first_group() {
        let re = Regex::new(r"progress: (\d+(?:\.\d+)?)%").unwrap();
        assert_eq!(parse_progress(&re, "progress: 42%"), Some(42.0));
        assert_eq!(parse_progress(&re, "progress: 12.5%"), Some(12.5));
        assert_eq!(parse_progress(&re, "nothing here"), None);
    }

    #[test]
    fn pattern_without_group_yields_nothing() {
        let re = Regex::new(r"done").unwrap();
        assert_eq!(parse_progress(&re, "done"), None);
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = CommandTask::new("true")
            .with_progress_pattern("(unclosed")
            .unwrap_err();
        assert!(matches!(err, TaskGroupError::ConfigError(_)));
    }
}
