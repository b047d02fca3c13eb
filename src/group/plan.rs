// src/group/plan.rs

//! Immutable snapshot of a task group consumed by one run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dag::DependencyGraph;
use crate::group::GroupStatus;
use crate::task::Task;
use crate::types::{GroupId, TaskId, UserInfo};

/// What the executor runs: the group's members and edges frozen at submit
/// time, plus a handle to the group's live aggregate state.
///
/// Delegates receive the plan as context for every notification. Members are
/// addressed by their index in [`RunPlan::tasks`], which is the insertion
/// order of the group.
#[derive(Debug, Clone)]
pub struct RunPlan {
    group_id: GroupId,
    run_id: u64,
    tag: Option<String>,
    user_info: UserInfo,
    tasks: Vec<Task>,
    index_of: HashMap<TaskId, usize>,
    graph: DependencyGraph,
    status: Arc<GroupStatus>,
}

impl RunPlan {
    pub(crate) fn new(
        group_id: GroupId,
        run_id: u64,
        tag: Option<String>,
        user_info: UserInfo,
        tasks: Vec<Task>,
        graph: DependencyGraph,
        status: Arc<GroupStatus>,
    ) -> Self {
        let index_of = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (task.id(), index))
            .collect();

        Self {
            group_id,
            run_id,
            tag,
            user_info,
            tasks,
            index_of,
            graph,
            status,
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Run counter of the owning group; the first run is `1`.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn index_of(&self, task: &Task) -> Option<usize> {
        self.index_by_id(task.id())
    }

    pub(crate) fn index_by_id(&self, id: TaskId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Declared dependencies of a member task (empty for non-members).
    pub fn dependencies_of(&self, task: &Task) -> Vec<Task> {
        self.graph
            .predecessors_of(task.id())
            .into_iter()
            .filter_map(|id| self.index_by_id(id).map(|i| self.tasks[i].clone()))
            .collect()
    }

    pub fn status(&self) -> &Arc<GroupStatus> {
        &self.status
    }

    pub fn progress(&self) -> f32 {
        self.status.progress()
    }

    pub fn failure_count(&self) -> usize {
        self.status.failure_count()
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
}
