// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `taskgroup`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskgroup",
    version,
    about = "Run a group of dependent shell commands and report aggregate progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the group file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKGROUP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print the group, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_taskgroup_toml() {
        let args = CliArgs::try_parse_from(["taskgroup"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Taskgroup.toml"));
        assert_eq!(args.config, default_config_path());
        assert!(!args.dry_run);
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::try_parse_from([
            "taskgroup",
            "--config",
            "ci/Group.toml",
            "--log-level",
            "debug",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("ci/Group.toml"));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.dry_run);
    }
}
