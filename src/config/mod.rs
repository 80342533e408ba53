//! Project configuration (`forge-patcher.toml`).

pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{ProjectConfig, Sql, Tables, ValidationError, ValidationIssue, DEFAULT_HEADER};

/// Config file looked up in the current directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "forge-patcher.toml";
