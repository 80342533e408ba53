//! Machine-readable failure report for a compilation run.

use crate::patch::{PatchFileError, RowSource};
use crate::sql::{ApplyReport, CompiledPlan, RowFailure, StatementFailure};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub statements: usize,
    pub skipped_rows: usize,
    pub files: Vec<FileEntry>,
    pub rows: Vec<RowEntry>,
    pub execution: Vec<ExecutionEntry>,
}

/// A patch file whose remaining lines were abandoned.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub file: String,
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// A row skipped for one version.
#[derive(Debug, Clone, Serialize)]
pub struct RowEntry {
    #[serde(flatten)]
    pub source: RowSource,
    pub version: String,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEntry {
    #[serde(flatten)]
    pub source: RowSource,
    pub version: String,
    pub reason: String,
}

impl From<&PatchFileError> for FileEntry {
    fn from(error: &PatchFileError) -> Self {
        match error {
            PatchFileError::Directive {
                file,
                line,
                text,
                source,
            } => FileEntry {
                file: file.clone(),
                line: *line,
                text: text.clone(),
                reason: source.to_string(),
            },
            PatchFileError::MissingHeader { file, line, text } => FileEntry {
                file: file.clone(),
                line: *line,
                text: text.clone(),
                reason: "directive before header".to_string(),
            },
        }
    }
}

impl From<&RowFailure> for RowEntry {
    fn from(failure: &RowFailure) -> Self {
        RowEntry {
            source: failure.source.clone(),
            version: failure.version.to_string(),
            text: failure.text.clone(),
            reason: failure.error.to_string(),
        }
    }
}

impl From<&StatementFailure> for ExecutionEntry {
    fn from(failure: &StatementFailure) -> Self {
        ExecutionEntry {
            source: failure.source.clone(),
            version: failure.version.to_string(),
            reason: failure.error.to_string(),
        }
    }
}

impl Report {
    pub fn new(plan: &CompiledPlan, file_failures: &[PatchFileError]) -> Self {
        Report {
            statements: plan.statement_count(),
            skipped_rows: plan.skipped_total(),
            files: file_failures.iter().map(FileEntry::from).collect(),
            rows: plan.failures.iter().map(RowEntry::from).collect(),
            execution: Vec::new(),
        }
    }

    pub fn record_execution(&mut self, applied: &ApplyReport) {
        self.execution
            .extend(applied.failures.iter().map(ExecutionEntry::from));
    }

    pub fn has_failures(&self) -> bool {
        !(self.files.is_empty() && self.rows.is_empty() && self.execution.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
