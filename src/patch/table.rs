//! Accumulation of patch files into a per-version table of rows.

use super::row::{join_row, parse_row};
use crate::version::{resolve_range, RangeError, Version, VersionSequence};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Lines starting with this prefix re-scope the rows that follow them.
pub const DIRECTIVE_PREFIX: &str = "@@";

/// Where a row came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowSource {
    pub file: String,
    /// 1-based line number
    pub line: usize,
}

impl fmt::Display for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Column names of a patch file; the first column is the match key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    columns: Vec<String>,
}

impl ColumnHeader {
    pub fn parse(line: &str) -> Self {
        Self {
            columns: parse_row(line)
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.columns[0]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(String::as_str)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl fmt::Display for ColumnHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_row(&self.columns))
    }
}

/// One data line of a patch file. Empty fields mean "leave unchanged".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRow {
    pub fields: Vec<String>,
    /// Header of the file the row was read from
    pub header: Arc<ColumnHeader>,
    pub source: RowSource,
    /// The line as written, for error reports
    pub text: String,
}

impl PatchRow {
    pub fn key(&self) -> &str {
        &self.fields[0]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchFileError {
    #[error("{file}:{line}: invalid directive '{text}': {source}")]
    Directive {
        file: String,
        line: usize,
        text: String,
        source: RangeError,
    },

    #[error("{file}:{line}: directive '{text}' appears before the header line")]
    MissingHeader {
        file: String,
        line: usize,
        text: String,
    },
}

impl PatchFileError {
    pub fn file(&self) -> &str {
        match self {
            PatchFileError::Directive { file, .. } | PatchFileError::MissingHeader { file, .. } => {
                file
            }
        }
    }
}

/// What a single file contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub rows: usize,
    pub directives: usize,
}

/// Rows per version, in the order they were accumulated.
#[derive(Debug, Clone, Default)]
pub struct PatchTable {
    header: Option<Arc<ColumnHeader>>,
    rows: Vec<PatchRow>,
    by_version: BTreeMap<Version, Vec<usize>>,
}

impl PatchTable {
    /// The header of the last file that defined one. Rows carry their own
    /// file's header in [`PatchRow::header`].
    pub fn header(&self) -> Option<&ColumnHeader> {
        self.header.as_deref()
    }

    /// Versions that received at least one row, ascending.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.by_version.keys()
    }

    pub fn rows_for<'a>(&'a self, version: &Version) -> impl Iterator<Item = &'a PatchRow> + 'a {
        self.by_version
            .get(version)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    /// Distinct rows parsed, independent of how many versions they apply to.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_version.is_empty()
    }
}

/// Threads patch files through the directive/header state machine.
///
/// Files must be added in application order: for every version, rows are
/// kept in file order and then line order.
#[derive(Debug)]
pub struct PatchAccumulator<'a> {
    sequence: &'a VersionSequence,
    table: PatchTable,
}

impl<'a> PatchAccumulator<'a> {
    pub fn new(sequence: &'a VersionSequence) -> Self {
        Self {
            sequence,
            table: PatchTable::default(),
        }
    }

    /// Add a file whose rows apply to every version until a directive says otherwise.
    pub fn add_file(&mut self, name: &str, contents: &str) -> Result<FileSummary, PatchFileError> {
        let scope = self.sequence.as_slice().to_vec();
        self.add_file_scoped(name, contents, scope)
    }

    /// Add a file with an explicit initial scope.
    ///
    /// On a directive error the rest of the file is abandoned; rows added
    /// before the failing line stay in the table.
    pub fn add_file_scoped(
        &mut self,
        name: &str,
        contents: &str,
        scope: Vec<Version>,
    ) -> Result<FileSummary, PatchFileError> {
        let mut scope = scope;
        let mut summary = FileSummary::default();
        let mut header: Option<Arc<ColumnHeader>> = None;
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.trim().is_empty() {
                continue;
            }

            if let Some(expression) = line.strip_prefix(DIRECTIVE_PREFIX) {
                if header.is_none() {
                    return Err(PatchFileError::MissingHeader {
                        file: name.to_string(),
                        line: line_no,
                        text: line.to_string(),
                    });
                }
                scope = resolve_range(expression, self.sequence).map_err(|source| {
                    PatchFileError::Directive {
                        file: name.to_string(),
                        line: line_no,
                        text: line.to_string(),
                        source,
                    }
                })?;
                summary.directives += 1;
                tracing::debug!(
                    file = name,
                    line = line_no,
                    versions = scope.len(),
                    "directive re-scoped rows"
                );
                continue;
            }

            let Some(active) = header.clone() else {
                header = Some(self.set_header(name, ColumnHeader::parse(line)));
                continue;
            };

            self.push_row(
                PatchRow {
                    fields: parse_row(line),
                    header: active,
                    source: RowSource {
                        file: name.to_string(),
                        line: line_no,
                    },
                    text: line.to_string(),
                },
                &scope,
            );
            summary.rows += 1;
        }

        tracing::info!(
            file = name,
            rows = summary.rows,
            directives = summary.directives,
            "accumulated patch file"
        );
        Ok(summary)
    }

    pub fn finish(self) -> PatchTable {
        self.table
    }

    fn set_header(&mut self, file: &str, header: ColumnHeader) -> Arc<ColumnHeader> {
        let header = match &self.table.header {
            Some(previous) if **previous == header => Arc::clone(previous),
            previous => {
                if let Some(previous) = previous {
                    tracing::debug!(
                        file,
                        previous = %previous,
                        header = %header,
                        "patch file uses a different column header"
                    );
                }
                Arc::new(header)
            }
        };
        self.table.header = Some(Arc::clone(&header));
        header
    }

    fn push_row(&mut self, row: PatchRow, scope: &[Version]) {
        let idx = self.table.rows.len();
        self.table.rows.push(row);
        for version in scope {
            self.table
                .by_version
                .entry(version.clone())
                .or_default()
                .push(idx);
        }
    }
}
