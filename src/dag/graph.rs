// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, TaskGroupError};
use crate::types::{TaskId, TaskStatus};

/// Dependency graph over the members of a task group.
///
/// Nodes are task ids. Edge direction is `dependency -> dependent`, so for
/// "B depends on A" we store `A -> B`. The graph is kept acyclic at all
/// times: edges that would close a cycle are rejected before insertion.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraphMap<TaskId, ()>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, task: TaskId) {
        self.graph.add_node(task);
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, task: TaskId) -> bool {
        self.graph.remove_node(task)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.graph.contains_node(task)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.nodes()
    }

    /// Declare that `task` depends on `depends_on`.
    ///
    /// Returns `Ok(false)` if the edge already existed.
    pub fn add_edge(&mut self, task: TaskId, depends_on: TaskId) -> Result<bool> {
        for id in [task, depends_on] {
            if !self.graph.contains_node(id) {
                return Err(TaskGroupError::UnknownTask(id.to_string()));
            }
        }

        if task == depends_on {
            return Err(TaskGroupError::CycleDetected(format!(
                "{task} cannot depend on itself"
            )));
        }

        if self.graph.contains_edge(depends_on, task) {
            return Ok(false);
        }

        // The new edge `depends_on -> task` closes a cycle iff `depends_on`
        // is already reachable from `task`.
        if has_path_connecting(&self.graph, task, depends_on, None) {
            return Err(TaskGroupError::CycleDetected(format!(
                "{depends_on} already depends (transitively) on {task}"
            )));
        }

        self.graph.add_edge(depends_on, task, ());
        Ok(true)
    }

    /// Direct dependencies of `task`.
    pub fn predecessors_of(&self, task: TaskId) -> Vec<TaskId> {
        self.graph
            .neighbors_directed(task, Direction::Incoming)
            .collect()
    }

    /// Tasks that directly depend on `task`.
    pub fn dependents_of(&self, task: TaskId) -> Vec<TaskId> {
        self.graph
            .neighbors_directed(task, Direction::Outgoing)
            .collect()
    }

    /// Non-terminal tasks whose predecessors have all been fully processed
    /// (`Succeeded` or `Failed`).
    ///
    /// A failed predecessor does not hold its dependents back. Tasks missing
    /// from `statuses` are treated as `Idle`.
    pub fn ready_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        let status_of = |id: TaskId| statuses.get(&id).copied().unwrap_or_default();

        self.graph
            .nodes()
            .filter(|&id| !status_of(id).is_terminal())
            .filter(|&id| {
                self.graph
                    .neighbors_directed(id, Direction::Incoming)
                    .all(|dep| status_of(dep).unblocks_dependents())
            })
            .collect()
    }
}
