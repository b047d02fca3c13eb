// src/errors.rs

//! Crate-wide error type.
//!
//! Everything in here is a *configuration* error: caller misuse detected
//! synchronously at the point of the mistake. A task failing at runtime is
//! not an error of the executor; it is recorded as `TaskStatus::Failed` on the
//! task itself.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskGroupError {
    #[error("Task not in group: {0}")]
    UnknownTask(String),

    #[error("Cycle detected in task dependencies: {0}")]
    CycleDetected(String),

    #[error("Task group is already running: {0}")]
    AlreadyRunning(String),

    #[error("Task group cannot be modified while running: {0}")]
    GroupRunning(String),

    #[error("Task already belongs to another group: {0}")]
    TaskInAnotherGroup(String),

    #[error("Task is still running in a previous run: {0}")]
    TaskBusy(String),

    #[error("Invalid executor option: {0}")]
    InvalidOption(String),

    #[error("No Tokio runtime available to drive the task group")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskGroupError>;
