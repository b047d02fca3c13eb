// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`graph`] holds the acyclic dependency graph of a task group.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run and keeps the group aggregates up to date.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;

pub use graph::DependencyGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
