// src/config/mod.rs

//! Group file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a group file from disk and turn it into a `TaskGroup` (`loader.rs`).
//! - Validate invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{LoadedGroup, build_group, default_config_path, load_and_validate, load_from_path};
pub use model::{GroupFile, GroupSection, RawGroupFile, TaskConfig};
