// src/config/loader.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GroupFile, RawGroupFile};
use crate::engine::ExecutorOptions;
use crate::errors::Result;
use crate::exec::CommandTask;
use crate::group::TaskGroup;
use crate::task::Task;

/// Load a group file from a given path and return the raw `RawGroupFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGroupFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawGroupFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a group file and validate it:
///
/// - unknown or self `after` references;
/// - dependency cycles;
/// - invalid `progress_on_stdout` patterns;
/// - `max_concurrent_tasks = 0`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GroupFile> {
    let raw = load_from_path(&path)?;
    let file = GroupFile::try_from(raw)?;
    debug!(
        path = %path.as_ref().display(),
        tasks = file.task.len(),
        "group file loaded"
    );
    Ok(file)
}

/// Default group file: `Taskgroup.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskgroup.toml")
}

/// A group built from a group file, ready to submit.
#[derive(Debug)]
pub struct LoadedGroup {
    pub group: TaskGroup,
    /// Member tasks keyed by their section name.
    pub tasks: BTreeMap<String, Task>,
    pub options: ExecutorOptions,
}

/// Turn a validated group file into a [`TaskGroup`] of [`CommandTask`]s.
pub fn build_group(file: &GroupFile) -> Result<LoadedGroup> {
    let mut group = TaskGroup::new();
    if let Some(tag) = file.group.tag.as_deref() {
        group.set_tag(tag);
    }
    group.set_user_info(file.group.user_info.clone());

    let mut tasks = BTreeMap::new();
    for (name, cfg) in file.task.iter() {
        let mut payload = CommandTask::new(cfg.cmd.clone());
        if let Some(pattern) = cfg.progress_on_stdout.as_deref() {
            payload = payload.with_progress_pattern(pattern)?;
        }
        let task = Task::builder(payload)
            .tag(cfg.effective_tag(name))
            .user_info(cfg.user_info.clone())
            .build();
        group.add_task(&task)?;
        tasks.insert(name.clone(), task);
    }

    for (name, cfg) in file.task.iter() {
        for dep in cfg.after.iter() {
            if let (Some(task), Some(depends_on)) = (tasks.get(name), tasks.get(dep)) {
                group.add_dependency(task, depends_on)?;
            }
        }
    }

    let options = ExecutorOptions {
        max_concurrent_tasks: file.group.max_concurrent_tasks,
    };
    options.validate()?;

    Ok(LoadedGroup {
        group,
        tasks,
        options,
    })
}
