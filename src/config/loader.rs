//! Reading and validating `forge-patcher.toml`.

use crate::config::schema::{ProjectConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid config{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Record which file a parse or validation error came from.
    fn in_file(mut self, file: &Path) -> Self {
        if let ConfigError::Toml { path, .. } | ConfigError::Validation { path, .. } = &mut self {
            path.get_or_insert_with(|| file.to_path_buf());
        }
        self
    }
}

pub fn load_from_str(input: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Load a config file. A relative `patch_dir` is resolved against the
/// directory holding the config file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProjectConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|error| error.in_file(path))?;

    if config.patch_dir.is_relative() {
        if let Some(base) = path.parent() {
            config.patch_dir = base.join(&config.patch_dir);
        }
    }
    Ok(config)
}
