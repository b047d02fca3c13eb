// src/group/mod.rs

//! Task groups.
//!
//! - [`TaskGroup`] is the configuration phase: members, edges, tag and user
//!   info, all mutable while the group is not running.
//! - [`RunPlan`] is the immutable snapshot one run executes.
//! - [`GroupStatus`] is the live aggregate state (running / finished /
//!   cancelled / progress / failure count), shared with the executor.

pub mod plan;
pub mod status;

use std::sync::Arc;

use tracing::debug;

use crate::dag::DependencyGraph;
use crate::errors::{Result, TaskGroupError};
use crate::task::Task;
use crate::types::{GroupId, UserInfo};

pub use plan::RunPlan;
pub use status::GroupStatus;

/// A caller-assembled set of tasks plus the dependencies between them.
///
/// A task belongs to at most one group at a time. Dropping the group (or
/// removing the task) releases it for use elsewhere.
#[derive(Debug)]
pub struct TaskGroup {
    id: GroupId,
    tag: Option<String>,
    user_info: UserInfo,
    tasks: Vec<Task>,
    graph: DependencyGraph,
    status: Arc<GroupStatus>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            id: GroupId::next(),
            tag: None,
            user_info: UserInfo::new(),
            tasks: Vec::new(),
            graph: DependencyGraph::new(),
            status: Arc::new(GroupStatus::new()),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    pub fn set_user_info(&mut self, user_info: UserInfo) {
        self.user_info = user_info;
    }

    /// Members in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task: &Task) -> bool {
        self.graph.contains(task.id())
    }

    /// Add a task. Adding a task that is already a member is a no-op.
    pub fn add_task(&mut self, task: &Task) -> Result<()> {
        self.ensure_not_running("add a task")?;
        if self.contains(task) {
            return Ok(());
        }
        task.claim(self.id)?;
        self.graph.add_node(task.id());
        self.tasks.push(task.clone());
        debug!(group = %self.id, task = %task.label(), "task added to group");
        Ok(())
    }

    /// Remove a task and every dependency edge touching it.
    ///
    /// Returns `false` if the task was not a member.
    pub fn remove_task(&mut self, task: &Task) -> Result<bool> {
        self.ensure_not_running("remove a task")?;
        if !self.graph.remove_node(task.id()) {
            return Ok(false);
        }
        self.tasks.retain(|member| member != task);
        task.release(self.id);
        debug!(group = %self.id, task = %task.label(), "task removed from group");
        Ok(true)
    }

    /// Declare that `task` only starts once `depends_on` has been fully
    /// processed (succeeded *or* failed).
    pub fn add_dependency(&mut self, task: &Task, depends_on: &Task) -> Result<()> {
        self.ensure_not_running("add a dependency")?;
        for t in [task, depends_on] {
            if !self.contains(t) {
                return Err(TaskGroupError::UnknownTask(format!(
                    "{} is not a member of {}",
                    t.label(),
                    self.id
                )));
            }
        }

        match self.graph.add_edge(task.id(), depends_on.id()) {
            Ok(_) => Ok(()),
            Err(TaskGroupError::CycleDetected(_)) => Err(TaskGroupError::CycleDetected(format!(
                "'{}' depending on '{}' would create a cycle",
                task.label(),
                depends_on.label()
            ))),
            Err(other) => Err(other),
        }
    }

    /// Direct dependencies of a member task.
    pub fn dependencies_for_task(&self, task: &Task) -> Result<Vec<Task>> {
        if !self.contains(task) {
            return Err(TaskGroupError::UnknownTask(format!(
                "{} is not a member of {}",
                task.label(),
                self.id
            )));
        }

        Ok(self
            .graph
            .predecessors_of(task.id())
            .into_iter()
            .filter_map(|id| self.tasks.iter().find(|t| t.id() == id).cloned())
            .collect())
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn status(&self) -> &Arc<GroupStatus> {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }

    pub fn progress(&self) -> f32 {
        self.status.progress()
    }

    pub fn failure_count(&self) -> usize {
        self.status.failure_count()
    }

    /// Request cancellation of the active run. Returns `false` if the group
    /// is not running.
    pub fn cancel(&self) -> bool {
        self.status.cancel()
    }

    /// Freeze the current members and edges into a [`RunPlan`].
    ///
    /// The executor does this on submit; it is public so a
    /// [`Scheduler`](crate::dag::Scheduler) can be driven by hand.
    pub fn snapshot(&self, run_id: u64) -> RunPlan {
        RunPlan::new(
            self.id,
            run_id,
            self.tag.clone(),
            self.user_info.clone(),
            self.tasks.clone(),
            self.graph.clone(),
            Arc::clone(&self.status),
        )
    }

    fn ensure_not_running(&self, what: &str) -> Result<()> {
        if self.status.is_running() {
            return Err(TaskGroupError::GroupRunning(format!(
                "cannot {what} while {} is running",
                self.id
            )));
        }
        Ok(())
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.release(self.id);
        }
    }
}
