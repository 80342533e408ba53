use crate::patch::parse_row;
use crate::sql::{DialectKind, TableNaming};
use crate::version::{Version, VersionError, VersionSequence};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_HEADER: &str = "name,description,eventbus,side";

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub versions: Vec<String>,
    #[serde(default = "default_patch_dir")]
    pub patch_dir: PathBuf,
    /// Header written into scaffolded patch files
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default)]
    pub tables: Tables,
    #[serde(default)]
    pub sql: Sql,
}

fn default_patch_dir() -> PathBuf {
    PathBuf::from("patches")
}

fn default_header() -> String {
    DEFAULT_HEADER.to_string()
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.versions.is_empty() {
            issues.push(ValidationIssue::EmptyVersionList);
        }

        for value in &self.versions {
            if let Err(VersionError::InvalidVersion { value, reason }) = Version::parse(value) {
                issues.push(ValidationIssue::InvalidVersion { value, reason });
            }
        }

        if self.patch_dir.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "patch_dir" });
        }

        let columns = parse_row(&self.header);
        for (index, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                issues.push(ValidationIssue::EmptyHeaderColumn { index });
            }
        }

        if self.tables.alias_prefix.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "tables.alias_prefix",
            });
        } else if self.tables.alias_prefix == self.tables.prefix {
            issues.push(ValidationIssue::InvalidCombo {
                message: "tables.prefix and tables.alias_prefix must differ".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// The configured versions, sorted and deduplicated.
    pub fn version_sequence(&self) -> Result<VersionSequence, VersionError> {
        VersionSequence::parse(&self.versions)
    }

    pub fn naming(&self) -> TableNaming {
        TableNaming {
            prefix: self.tables.prefix.clone(),
            alias_prefix: self.tables.alias_prefix.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tables {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_alias_prefix")]
    pub alias_prefix: String,
}

fn default_alias_prefix() -> String {
    "raw_".to_string()
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            alias_prefix: default_alias_prefix(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Sql {
    #[serde(default)]
    pub dialect: DialectKind,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyVersionList,
    InvalidVersion { value: String, reason: String },
    MissingField { field: &'static str },
    EmptyHeaderColumn { index: usize },
    InvalidCombo { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyVersionList => write!(f, "config lists no versions"),
            ValidationIssue::InvalidVersion { value, reason } => {
                write!(f, "invalid version '{value}': {reason}")
            }
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::EmptyHeaderColumn { index } => {
                write!(f, "header column {index} is empty")
            }
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid configuration: {message}")
            }
        }
    }
}
