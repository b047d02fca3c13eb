// src/exec/mod.rs

//! Task body execution layer.
//!
//! - [`task_runner`] spawns one task body on the Tokio runtime, wires its
//!   cancellation signal and reports its completion back to the run's
//!   coordinating loop via `RuntimeEvent`s.
//! - [`command`] provides [`CommandTask`], a payload that runs a shell
//!   command with `tokio::process::Command`, turning matching stdout lines
//!   into progress reports.

pub mod command;
pub mod task_runner;

pub use command::CommandTask;
