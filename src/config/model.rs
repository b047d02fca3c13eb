// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::UserInfo;

/// Group file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [group]
/// tag = "nightly"
/// max_concurrent_tasks = 2
///
/// [group.user_info]
/// owner = "ci"
///
/// [task.fetch]
/// cmd = "./fetch.sh"
///
/// [task.build]
/// cmd = "./build.sh"
/// after = ["fetch"]
/// progress_on_stdout = "^progress: (\\d+)%"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawGroupFile {
    #[serde(default)]
    pub group: GroupSection,

    /// All tasks from `[task.<name>]`, keyed by name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated group file.
///
/// Obtain one through `GroupFile::try_from(raw)` (see `validate.rs`) or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct GroupFile {
    pub group: GroupSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl GroupFile {
    pub(crate) fn new_unchecked(group: GroupSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { group, task }
    }
}

/// `[group]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    #[serde(default)]
    pub tag: Option<String>,

    /// Upper bound on concurrently running tasks; unlimited when absent.
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,

    #[serde(default)]
    pub user_info: UserInfo,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command to execute.
    pub cmd: String,

    /// Tag of the task; defaults to the section name.
    #[serde(default)]
    pub tag: Option<String>,

    /// This task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Regex whose capture group 1 is a percentage printed on stdout.
    #[serde(default)]
    pub progress_on_stdout: Option<String>,

    #[serde(default)]
    pub user_info: UserInfo,
}

impl TaskConfig {
    pub fn effective_tag<'a>(&'a self, name: &'a str) -> &'a str {
        self.tag.as_deref().unwrap_or(name)
    }
}
