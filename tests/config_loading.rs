use std::fs;

use tempfile::tempdir;

use taskgroup::config::{GroupFile, build_group, load_and_validate, load_from_path};
use taskgroup::errors::TaskGroupError;
use taskgroup_test_utils::builders::{GroupFileBuilder, TaskConfigBuilder};

#[test]
fn loads_full_group_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Taskgroup.toml");
    fs::write(
        &path,
        r#"
[group]
tag = "nightly"
max_concurrent_tasks = 2

[group.user_info]
owner = "ci"

[task.fetch]
cmd = "echo fetch"

[task.build]
cmd = "echo build"
after = ["fetch"]
tag = "compile"
progress_on_stdout = "^progress: (\\d+)%"

[task.build.user_info]
target = "release"
"#,
    )
    .unwrap();

    let file = load_and_validate(&path).unwrap();
    assert_eq!(file.group.tag.as_deref(), Some("nightly"));
    assert_eq!(file.group.max_concurrent_tasks, Some(2));
    assert_eq!(file.group.user_info.get("owner").map(String::as_str), Some("ci"));
    assert_eq!(file.task.len(), 2);
    assert_eq!(file.task["build"].after, vec!["fetch".to_string()]);

    let loaded = build_group(&file).unwrap();
    assert_eq!(loaded.group.tag(), Some("nightly"));
    assert_eq!(loaded.group.len(), 2);
    assert_eq!(loaded.options.max_concurrent_tasks, Some(2));

    let build = &loaded.tasks["build"];
    let fetch = &loaded.tasks["fetch"];
    assert_eq!(build.tag(), Some("compile"));
    assert_eq!(fetch.tag(), Some("fetch"));
    assert_eq!(build.user_info().get("target").map(String::as_str), Some("release"));
    assert_eq!(loaded.group.dependencies_for_task(build).unwrap(), vec![fetch.clone()]);
}

#[test]
fn empty_file_is_an_empty_group() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    fs::write(&path, "").unwrap();

    let file = load_and_validate(&path).unwrap();
    let loaded = build_group(&file).unwrap();
    assert!(loaded.group.is_empty());
    assert_eq!(loaded.options.max_concurrent_tasks, None);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = load_from_path(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, TaskGroupError::IoError(_)));
}

#[test]
fn malformed_toml_is_toml_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[task.a\ncmd = ").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, TaskGroupError::TomlError(_)));
}

#[test]
fn unknown_field_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typo.toml");
    fs::write(&path, "[task.a]\ncmd = \"true\"\naftr = [\"b\"]\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, TaskGroupError::TomlError(_)));
}

#[test]
fn unknown_dependency_is_config_error() {
    let raw = GroupFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").after("ghost").build())
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::ConfigError(ref msg) if msg.contains("ghost")));
}

#[test]
fn self_dependency_is_config_error() {
    let raw = GroupFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").after("a").build())
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::ConfigError(_)));
}

#[test]
fn dependency_cycle_is_detected() {
    let raw = GroupFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").after("c").build())
        .with_task("b", TaskConfigBuilder::new("true").after("a").build())
        .with_task("c", TaskConfigBuilder::new("true").after("b").build())
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::CycleDetected(_)));
}

#[test]
fn invalid_progress_regex_is_config_error() {
    let raw = GroupFileBuilder::new()
        .with_task(
            "a",
            TaskConfigBuilder::new("true").progress_on_stdout("(oops").build(),
        )
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::ConfigError(_)));
}

#[test]
fn zero_concurrency_is_config_error() {
    let raw = GroupFileBuilder::new()
        .with_max_concurrent_tasks(0)
        .with_task("a", TaskConfigBuilder::new("true").build())
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::ConfigError(_)));
}

#[test]
fn empty_command_is_config_error() {
    let raw = GroupFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("   ").build())
        .raw();

    let err = GroupFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskGroupError::ConfigError(_)));
}

#[test]
fn builder_groups_keep_tags_and_limits() {
    let file = GroupFileBuilder::new()
        .with_tag("release")
        .with_max_concurrent_tasks(3)
        .with_task("lint", TaskConfigBuilder::new("true").tag("style").build())
        .with_task("test", TaskConfigBuilder::new("true").after("lint").build())
        .build();

    let loaded = build_group(&file).unwrap();
    assert_eq!(loaded.group.tag(), Some("release"));
    assert_eq!(loaded.options.max_concurrent_tasks, Some(3));
    assert_eq!(loaded.tasks["lint"].tag(), Some("style"));
    assert_eq!(loaded.group.graph().edge_count(), 1);
}
