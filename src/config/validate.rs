// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{GroupFile, RawGroupFile};
use crate::errors::{Result, TaskGroupError};

impl TryFrom<RawGroupFile> for GroupFile {
    type Error = TaskGroupError;

    fn try_from(raw: RawGroupFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_group(&raw)?;
        Ok(GroupFile::new_unchecked(raw.group, raw.task))
    }
}

fn validate_raw_group(cfg: &RawGroupFile) -> Result<()> {
    validate_group_section(cfg)?;
    validate_tasks(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn validate_group_section(cfg: &RawGroupFile) -> Result<()> {
    if cfg.group.max_concurrent_tasks == Some(0) {
        return Err(TaskGroupError::ConfigError(
            "[group].max_concurrent_tasks must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawGroupFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(TaskGroupError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
        if let Some(pattern) = task.progress_on_stdout.as_deref() {
            Regex::new(pattern).map_err(|e| {
                TaskGroupError::ConfigError(format!(
                    "task '{name}' has invalid `progress_on_stdout` regex: {e}"
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawGroupFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(TaskGroupError::ConfigError(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(TaskGroupError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawGroupFile) -> Result<()> {
    // Edge direction: dep -> task, as in the runtime dependency graph.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskGroupError::CycleDetected(format!(
            "cycle detected in task group involving task '{}'",
            cycle.node_id()
        ))),
    }
}
