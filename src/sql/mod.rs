//! Compilation of patch rows into UPDATE statements and their execution.
//!
//! Every version owns one table, named from the version by [`TableNaming`].
//! A row compiled for a target version updates that version's table and may
//! read the same-named column from other versions' tables through
//! `@version@` references.

pub mod compiler;
pub mod dialect;
pub mod executor;
pub mod fragment;

pub use compiler::{CompileError, CompiledPlan, CompiledStatement, RowFailure, StatementCompiler};
pub use dialect::{Ansi, DialectKind, MySql, SqlDialect};
pub use executor::{
    apply_plan, ApplyReport, ExecError, ExecPolicy, ScriptExecutor, StatementExecutor,
    StatementFailure,
};

use crate::version::Version;

/// How version tables and their aliases are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNaming {
    pub prefix: String,
    pub alias_prefix: String,
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            alias_prefix: "raw_".to_string(),
        }
    }
}

impl TableNaming {
    pub fn table(&self, version: &Version) -> String {
        format!("{}{}", self.prefix, version.table_suffix())
    }

    pub fn alias(&self, version: &Version) -> String {
        format!("{}{}", self.alias_prefix, version.table_suffix())
    }

    pub fn table_ref(&self, version: &Version) -> TableRef {
        TableRef {
            version: version.clone(),
            table: self.table(version),
            alias: self.alias(version),
        }
    }
}

/// A version table as referenced by one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub version: Version,
    pub table: String,
    pub alias: String,
}
