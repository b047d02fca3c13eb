#![allow(dead_code)]

use std::collections::BTreeMap;

use taskgroup::config::{GroupFile, GroupSection, RawGroupFile, TaskConfig};

/// Builder for `GroupFile` to simplify test setup.
pub struct GroupFileBuilder {
    raw: RawGroupFile,
}

impl GroupFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawGroupFile {
                group: GroupSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.raw.group.tag = Some(tag.to_string());
        self
    }

    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.raw.group.max_concurrent_tasks = Some(limit);
        self
    }

    pub fn raw(self) -> RawGroupFile {
        self.raw
    }

    pub fn build(self) -> GroupFile {
        GroupFile::try_from(self.raw).expect("Failed to build valid group file from builder")
    }
}

impl Default for GroupFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                tag: None,
                after: vec![],
                progress_on_stdout: None,
                user_info: BTreeMap::new(),
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.task.tag = Some(tag.to_string());
        self
    }

    pub fn progress_on_stdout(mut self, pattern: &str) -> Self {
        self.task.progress_on_stdout = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
