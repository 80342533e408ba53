//! Sequential application of compiled statements.
//!
//! Fill-if-empty updates observe the effects of earlier statements on the
//! same table, so statements for one version are issued strictly one after
//! another in plan order, each completing before the next starts.

use super::compiler::{CompiledPlan, CompiledStatement};
use super::dialect::SqlDialect;
use super::TableRef;
use crate::patch::RowSource;
use crate::version::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("statement rejected by store: {message}")]
    Rejected { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The store a plan is applied to.
pub trait StatementExecutor {
    /// Run one `UPDATE <tables> SET <set_clause> WHERE <where_clause>` and
    /// return the number of rows it changed.
    fn execute(
        &mut self,
        tables: &[TableRef],
        set_clause: &str,
        where_clause: &str,
    ) -> Result<u64, ExecError>;
}

/// What to do with the rest of a version's statements after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecPolicy {
    #[default]
    Continue,
    HaltTable,
}

#[derive(Debug)]
pub struct StatementFailure {
    pub version: Version,
    pub source: RowSource,
    pub error: ExecError,
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.source, self.version, self.error)
    }
}

#[derive(Debug, Default)]
#[must_use = "ApplyReport carries the statement failures"]
pub struct ApplyReport {
    /// Statements executed successfully, per version
    pub applied: BTreeMap<Version, usize>,
    pub rows_affected: u64,
    pub failures: Vec<StatementFailure>,
    /// Versions whose remaining statements were not issued
    pub halted: Vec<Version>,
}

impl ApplyReport {
    pub fn applied_total(&self) -> usize {
        self.applied.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply every statement of `plan`, version by version.
pub fn apply_plan(
    plan: &CompiledPlan,
    executor: &mut dyn StatementExecutor,
    policy: ExecPolicy,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (version, statements) in &plan.statements {
        let applied = report.applied.entry(version.clone()).or_default();
        for (idx, statement) in statements.iter().enumerate() {
            match run(executor, statement) {
                Ok(rows) => {
                    *applied += 1;
                    report.rows_affected += rows;
                }
                Err(error) => {
                    tracing::warn!(
                        version = %version,
                        source = %statement.source,
                        %error,
                        "statement failed"
                    );
                    report.failures.push(StatementFailure {
                        version: version.clone(),
                        source: statement.source.clone(),
                        error,
                    });
                    if policy == ExecPolicy::HaltTable {
                        tracing::warn!(
                            version = %version,
                            remaining = statements.len() - idx - 1,
                            "halting statements for version"
                        );
                        report.halted.push(version.clone());
                        break;
                    }
                }
            }
        }
        tracing::info!(version = %version, applied = *applied, "applied statements");
    }

    report
}

fn run(executor: &mut dyn StatementExecutor, statement: &CompiledStatement) -> Result<u64, ExecError> {
    executor.execute(
        &statement.tables,
        &statement.set_clause,
        &statement.where_clause,
    )
}

/// Renders statements into a SQL script instead of running them.
///
/// A `-- version <v>` comment is written whenever the primary table changes.
/// Nothing is executed, so every statement reports zero affected rows.
pub struct ScriptExecutor<'d, W: Write> {
    writer: W,
    dialect: &'d dyn SqlDialect,
    current: Option<Version>,
    written: usize,
}

impl<'d, W: Write> ScriptExecutor<'d, W> {
    pub fn new(writer: W, dialect: &'d dyn SqlDialect) -> Self {
        Self {
            writer,
            dialect,
            current: None,
            written: 0,
        }
    }

    pub fn statements_written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatementExecutor for ScriptExecutor<'_, W> {
    fn execute(
        &mut self,
        tables: &[TableRef],
        set_clause: &str,
        where_clause: &str,
    ) -> Result<u64, ExecError> {
        let primary = tables.first().ok_or_else(|| ExecError::Rejected {
            message: "statement references no table".to_string(),
        })?;
        if self.current.as_ref() != Some(&primary.version) {
            if self.current.is_some() {
                writeln!(self.writer)?;
            }
            writeln!(self.writer, "-- version {}", primary.version)?;
            self.current = Some(primary.version.clone());
        }
        writeln!(
            self.writer,
            "{};",
            self.dialect.update_statement(tables, set_clause, where_clause)
        )?;
        self.written += 1;
        Ok(0)
    }
}
