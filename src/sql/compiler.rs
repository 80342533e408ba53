//! Patch row to UPDATE statement compilation.
//!
//! For a row `Foo,@+@1.7@ legacy` under header `name,description`, compiled
//! for version `1.8` with the MySQL dialect:
//!
//! ```sql
//! UPDATE `1_8` AS `raw_1_8` CROSS JOIN `1_7` AS `raw_1_7`
//! SET `raw_1_8`.`description` = CASE
//!     WHEN `raw_1_8`.`description` IS NULL OR `raw_1_8`.`description` = ''
//!     THEN CONCAT(`raw_1_7`.`description`, ' legacy')
//!     ELSE `raw_1_8`.`description` END
//! WHERE `raw_1_8`.`name` LIKE 'Foo' AND `raw_1_7`.`name` LIKE 'Foo'
//! ```
//!
//! The ANSI dialect updates the primary table alone and reads `raw_1_7`
//! through a scalar subquery instead of the join.
//!
//! Compilation is pure; a failing row never affects the others.

use super::dialect::SqlDialect;
use super::fragment::{scan, Fragment};
use super::{TableNaming, TableRef};
use crate::patch::{ColumnHeader, PatchRow, PatchTable, RowSource};
use crate::version::{Version, VersionSequence};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Values starting with this marker only fill a column that is NULL or empty.
pub const CONDITIONAL_MARKER: &str = "@+";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("row has {found} fields but the header has {expected}")]
    IllegalPatchRow { expected: usize, found: usize },

    #[error("column '{column}': unterminated '@' reference in '{value}'")]
    UnfinishedReference { column: String, value: String },

    #[error("column '{column}': reference to unknown version '{version}'")]
    UnknownVersionReference { column: String, version: String },
}

/// One executable UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    /// Primary table first, then referenced tables in first-use order. Only
    /// dialects that join references name the referenced tables in the UPDATE.
    pub tables: Vec<TableRef>,
    pub set_clause: String,
    pub where_clause: String,
    pub source: RowSource,
}

impl CompiledStatement {
    pub fn primary(&self) -> &TableRef {
        &self.tables[0]
    }

    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        dialect.update_statement(&self.tables, &self.set_clause, &self.where_clause)
    }
}

/// A row that could not be compiled for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub version: Version,
    pub source: RowSource,
    pub text: String,
    pub error: CompileError,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {} (row: {})",
            self.source, self.version, self.error, self.text
        )
    }
}

/// Statements for every version, in application order.
#[derive(Debug, Clone, Default)]
pub struct CompiledPlan {
    pub statements: BTreeMap<Version, Vec<CompiledStatement>>,
    pub failures: Vec<RowFailure>,
    /// Rows with no value to set, per version
    pub skipped: BTreeMap<Version, usize>,
}

impl CompiledPlan {
    pub fn statement_count(&self) -> usize {
        self.statements.values().map(Vec::len).sum()
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Keep only the given versions.
    pub fn retain_versions(&mut self, versions: &[Version]) {
        self.statements.retain(|v, _| versions.contains(v));
        self.skipped.retain(|v, _| versions.contains(v));
        self.failures.retain(|f| versions.contains(&f.version));
    }
}

/// The match key of the row being compiled.
struct RowKey<'h> {
    column: &'h str,
    /// Escaped key value
    literal: String,
}

/// Referenced tables of one statement, primary first.
struct TagSet<'n> {
    naming: &'n TableNaming,
    tables: Vec<TableRef>,
}

impl<'n> TagSet<'n> {
    fn new(naming: &'n TableNaming, primary: &Version) -> Self {
        Self {
            naming,
            tables: vec![naming.table_ref(primary)],
        }
    }

    fn insert(&mut self, version: &Version) -> TableRef {
        if let Some(existing) = self.tables.iter().find(|t| &t.version == version) {
            return existing.clone();
        }
        let table = self.naming.table_ref(version);
        self.tables.push(table.clone());
        table
    }

    fn primary(&self) -> &TableRef {
        &self.tables[0]
    }

    fn primary_alias(&self) -> &str {
        &self.primary().alias
    }

    fn is_joined(&self) -> bool {
        self.tables.len() > 1
    }
}

pub struct StatementCompiler<'a> {
    sequence: &'a VersionSequence,
    naming: &'a TableNaming,
    dialect: &'a dyn SqlDialect,
}

impl<'a> StatementCompiler<'a> {
    pub fn new(
        sequence: &'a VersionSequence,
        naming: &'a TableNaming,
        dialect: &'a dyn SqlDialect,
    ) -> Self {
        Self {
            sequence,
            naming,
            dialect,
        }
    }

    pub fn dialect(&self) -> &'a dyn SqlDialect {
        self.dialect
    }

    /// Compile one row for `target` against the header of its file. `Ok(None)`
    /// means every value column was empty and there is nothing to update.
    pub fn compile_row(
        &self,
        row: &PatchRow,
        header: &ColumnHeader,
        target: &Version,
    ) -> Result<Option<CompiledStatement>, CompileError> {
        if row.fields.len() != header.len() {
            return Err(CompileError::IllegalPatchRow {
                expected: header.len(),
                found: row.fields.len(),
            });
        }

        let d = self.dialect;
        let key = RowKey {
            column: header.key(),
            literal: d.escape(row.key()),
        };
        let mut tags = TagSet::new(self.naming, target);
        let mut assignments = Vec::new();

        for (column, value) in header.columns().iter().zip(&row.fields).skip(1) {
            if value.is_empty() {
                continue;
            }
            let expr = self.value_expression(column, value, &key, &mut tags)?;
            assignments.push((column, expr));
        }

        if assignments.is_empty() {
            return Ok(None);
        }

        let joined = tags.is_joined() && d.joins_references();
        let set_clause = assignments
            .iter()
            .map(|(column, expr)| {
                let lhs = if joined {
                    d.qualified(tags.primary_alias(), column)
                } else {
                    d.quote_identifier(column)
                };
                format!("{lhs} = {expr}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        let where_clause = if joined {
            tags.tables
                .iter()
                .map(|t| d.key_match(&d.qualified(&t.alias, key.column), &key.literal))
                .collect::<Vec<_>>()
                .join(" AND ")
        } else {
            d.key_match(&d.quote_identifier(key.column), &key.literal)
        };

        Ok(Some(CompiledStatement {
            tables: tags.tables,
            set_clause,
            where_clause,
            source: row.source.clone(),
        }))
    }

    fn value_expression(
        &self,
        column: &str,
        value: &str,
        key: &RowKey<'_>,
        tags: &mut TagSet<'_>,
    ) -> Result<String, CompileError> {
        let d = self.dialect;
        let (conditional, body) = match value.strip_prefix(CONDITIONAL_MARKER) {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        let fragments = scan(body).map_err(|_| CompileError::UnfinishedReference {
            column: column.to_string(),
            value: value.to_string(),
        })?;

        let mut parts = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment {
                Fragment::Literal(text) => parts.push(d.escape(text)),
                Fragment::Reference(name) => {
                    let version = Version::parse(name)
                        .ok()
                        .and_then(|v| self.sequence.get(&v).cloned())
                        .ok_or_else(|| CompileError::UnknownVersionReference {
                            column: column.to_string(),
                            version: name.to_string(),
                        })?;
                    let table = tags.insert(&version);
                    if d.joins_references() || table.version == tags.primary().version {
                        parts.push(d.qualified(&table.alias, column));
                    } else {
                        parts.push(d.scalar_reference(&table, column, key.column, &key.literal));
                    }
                }
            }
        }

        let expr = match parts.len() {
            0 => d.escape(body),
            1 => parts.remove(0),
            _ => d.concat(&parts),
        };

        if !conditional {
            return Ok(expr);
        }

        let current = d.qualified(tags.primary_alias(), column);
        Ok(format!(
            "CASE WHEN {current} IS NULL OR {current} = {empty} THEN {expr} ELSE {current} END",
            empty = d.escape("")
        ))
    }

    /// Compile every row of every version. Failing rows are collected, not fatal.
    pub fn compile_table(&self, table: &PatchTable) -> CompiledPlan {
        let mut plan = CompiledPlan::default();

        for version in table.versions() {
            let mut statements = Vec::new();
            for row in table.rows_for(version) {
                match self.compile_row(row, &row.header, version) {
                    Ok(Some(statement)) => {
                        tracing::debug!(
                            version = %version,
                            source = %row.source,
                            sql = %statement.to_sql(self.dialect),
                            "compiled statement"
                        );
                        statements.push(statement);
                    }
                    Ok(None) => {
                        tracing::debug!(version = %version, source = %row.source, "row sets nothing");
                        *plan.skipped.entry(version.clone()).or_default() += 1;
                    }
                    Err(error) => {
                        tracing::warn!(
                            version = %version,
                            source = %row.source,
                            row = %row.text,
                            %error,
                            "skipping row"
                        );
                        plan.failures.push(RowFailure {
                            version: version.clone(),
                            source: row.source.clone(),
                            text: row.text.clone(),
                            error,
                        });
                    }
                }
            }
            plan.statements.insert(version.clone(), statements);
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{parse_row, PatchAccumulator};
    use crate::sql::dialect::{Ansi, MySql};
    use std::sync::Arc;

    fn seq() -> VersionSequence {
        VersionSequence::parse(["1.7", "1.8", "1.9"]).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn row(header: &str, line: &str) -> PatchRow {
        PatchRow {
            fields: parse_row(line),
            header: Arc::new(ColumnHeader::parse(header)),
            source: RowSource {
                file: "test.csv".to_string(),
                line: 2,
            },
            text: line.to_string(),
        }
    }

    fn compile(header: &str, line: &str, target: &str) -> Result<Option<CompiledStatement>, CompileError> {
        let seq = seq();
        let naming = TableNaming::default();
        let compiler = StatementCompiler::new(&seq, &naming, &MySql);
        let row = row(header, line);
        compiler.compile_row(&row, &row.header, &v(target))
    }

    fn aliases(statement: &CompiledStatement) -> Vec<&str> {
        statement.tables.iter().map(|t| t.alias.as_str()).collect()
    }

    #[test]
    fn test_plain_literal() {
        let stmt = compile("name,description", "Foo,Hello", "1.8").unwrap().unwrap();
        assert_eq!(aliases(&stmt), ["raw_1_8"]);
        assert_eq!(stmt.set_clause, "`description` = 'Hello'");
        assert_eq!(stmt.where_clause, "`name` LIKE 'Foo'");
        assert_eq!(
            stmt.to_sql(&MySql),
            "UPDATE `1_8` AS `raw_1_8` SET `description` = 'Hello' WHERE `name` LIKE 'Foo'"
        );
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        let stmt = compile("name,description,side", "Foo,,CLIENT", "1.7")
            .unwrap()
            .unwrap();
        assert_eq!(stmt.set_clause, "`side` = 'CLIENT'");
    }

    #[test]
    fn test_row_without_values_compiles_to_nothing() {
        assert_eq!(compile("name,description", "Foo,", "1.7").unwrap(), None);
    }

    #[test]
    fn test_conditional_reference() {
        let stmt = compile("name,description", "Foo,@+@1.8@-text", "1.9")
            .unwrap()
            .unwrap();
        assert_eq!(aliases(&stmt), ["raw_1_9", "raw_1_8"]);
        assert_eq!(
            stmt.set_clause,
            "`raw_1_9`.`description` = CASE WHEN `raw_1_9`.`description` IS NULL \
             OR `raw_1_9`.`description` = '' \
             THEN CONCAT(`raw_1_8`.`description`, '-text') \
             ELSE `raw_1_9`.`description` END"
        );
        assert_eq!(
            stmt.where_clause,
            "`raw_1_9`.`name` LIKE 'Foo' AND `raw_1_8`.`name` LIKE 'Foo'"
        );
    }

    #[test]
    fn test_conditional_literal_stays_single_table() {
        let stmt = compile("name,description", "Foo,@+fallback", "1.8")
            .unwrap()
            .unwrap();
        assert_eq!(aliases(&stmt), ["raw_1_8"]);
        assert_eq!(
            stmt.set_clause,
            "`description` = CASE WHEN `raw_1_8`.`description` IS NULL \
             OR `raw_1_8`.`description` = '' THEN 'fallback' \
             ELSE `raw_1_8`.`description` END"
        );
        assert_eq!(stmt.where_clause, "`name` LIKE 'Foo'");
    }

    #[test]
    fn test_self_reference_does_not_join() {
        let stmt = compile("name,description", "Foo,@1.8@ (updated)", "1.8")
            .unwrap()
            .unwrap();
        assert_eq!(aliases(&stmt), ["raw_1_8"]);
        assert_eq!(
            stmt.set_clause,
            "`description` = CONCAT(`raw_1_8`.`description`, ' (updated)')"
        );
    }

    #[test]
    fn test_tag_set_is_shared_across_columns() {
        let stmt = compile(
            "name,description,side",
            "Foo,@1.7@,@1.9@;@1.7@",
            "1.8",
        )
        .unwrap()
        .unwrap();
        assert_eq!(aliases(&stmt), ["raw_1_8", "raw_1_7", "raw_1_9"]);
        assert_eq!(
            stmt.set_clause,
            "`raw_1_8`.`description` = `raw_1_7`.`description`, \
             `raw_1_8`.`side` = CONCAT(`raw_1_9`.`side`, ';', `raw_1_7`.`side`)"
        );
        assert_eq!(stmt.where_clause.matches(" LIKE 'Foo'").count(), 3);
    }

    #[test]
    fn test_literals_are_escaped() {
        let stmt = compile("name,description", r"O'Brien,say \,hi' --", "1.7")
            .unwrap()
            .unwrap();
        assert_eq!(stmt.set_clause, r"`description` = 'say ,hi\' --'");
        assert_eq!(stmt.where_clause, r"`name` LIKE 'O\'Brien'");
    }

    #[test]
    fn test_field_count_mismatch() {
        assert_eq!(
            compile("name,description", "Foo,a,b", "1.7").unwrap_err(),
            CompileError::IllegalPatchRow {
                expected: 2,
                found: 3
            }
        );
        assert!(matches!(
            compile("name,description", "Foo", "1.7"),
            Err(CompileError::IllegalPatchRow { found: 1, .. })
        ));
    }

    #[test]
    fn test_unfinished_reference() {
        assert!(matches!(
            compile("name,description", "Foo,@1.8 oops", "1.7"),
            Err(CompileError::UnfinishedReference { ref column, .. }) if column == "description"
        ));
        assert!(matches!(
            compile("name,description", "Foo,@+@", "1.7"),
            Err(CompileError::UnfinishedReference { .. })
        ));
    }

    #[test]
    fn test_unknown_version_reference() {
        for value in ["@2.0@", "@abc@", "@@"] {
            assert!(
                matches!(
                    compile("name,description", &format!("Foo,{value}"), "1.7"),
                    Err(CompileError::UnknownVersionReference { .. })
                ),
                "{value} should be an unknown reference"
            );
        }
    }

    #[test]
    fn test_ansi_dialect() {
        let seq = seq();
        let naming = TableNaming::default();
        let compiler = StatementCompiler::new(&seq, &naming, &Ansi);
        let compile = |line: &str| {
            let row = row("name,description", line);
            compiler.compile_row(&row, &row.header, &v("1.8")).unwrap().unwrap()
        };

        let stmt = compile("Foo,@1.7@ x");
        assert_eq!(aliases(&stmt), ["raw_1_8", "raw_1_7"]);
        assert_eq!(
            stmt.to_sql(&Ansi),
            "UPDATE \"1_8\" AS \"raw_1_8\" \
             SET \"description\" = ((SELECT \"raw_1_7\".\"description\" FROM \"1_7\" AS \"raw_1_7\" \
             WHERE LOWER(\"raw_1_7\".\"name\") LIKE LOWER('Foo')) || ' x') \
             WHERE LOWER(\"name\") LIKE LOWER('Foo')"
        );

        let stmt = compile("foo,@+@1.8@ (kept)");
        assert_eq!(aliases(&stmt), ["raw_1_8"]);
        assert_eq!(
            stmt.to_sql(&Ansi),
            "UPDATE \"1_8\" AS \"raw_1_8\" \
             SET \"description\" = CASE WHEN \"raw_1_8\".\"description\" IS NULL \
             OR \"raw_1_8\".\"description\" = '' \
             THEN (\"raw_1_8\".\"description\" || ' (kept)') \
             ELSE \"raw_1_8\".\"description\" END \
             WHERE LOWER(\"name\") LIKE LOWER('foo')"
        );
    }

    #[test]
    fn test_compile_table_collects_failures() {
        let seq = seq();
        let mut acc = PatchAccumulator::new(&seq);
        acc.add_file(
            "global.csv",
            "name,description\nGood,ok\nBad,@1.7\n@@1.8++\nLater,@+@1.7@\nEmpty,\n",
        )
        .unwrap();
        let table = acc.finish();

        let naming = TableNaming::default();
        let plan = StatementCompiler::new(&seq, &naming, &MySql).compile_table(&table);

        assert_eq!(plan.statements[&v("1.7")].len(), 1);
        assert_eq!(plan.statements[&v("1.8")].len(), 2);
        assert_eq!(plan.statements[&v("1.9")].len(), 2);
        assert_eq!(plan.failures.len(), 3);
        assert!(plan.failures.iter().all(|f| f.source.line == 3));
        assert_eq!(plan.skipped_total(), 2);
        assert_eq!(plan.skipped.get(&v("1.7")), None);
        assert_eq!(plan.statement_count(), 5);
    }

    #[test]
    fn test_rows_compile_against_their_own_header() {
        let seq = seq();
        let mut acc = PatchAccumulator::new(&seq);
        acc.add_file("global.csv", "name,description\nFoo,a long description\n")
            .unwrap();
        acc.add_file_scoped("1.8.csv", "name,side\nBar,CLIENT\n", vec![v("1.8")])
            .unwrap();
        let table = acc.finish();

        let naming = TableNaming::default();
        let plan = StatementCompiler::new(&seq, &naming, &MySql).compile_table(&table);
        assert!(plan.failures.is_empty());

        let sql: Vec<_> = plan.statements[&v("1.8")]
            .iter()
            .map(|s| s.to_sql(&MySql))
            .collect();
        assert_eq!(
            sql,
            [
                "UPDATE `1_8` AS `raw_1_8` SET `description` = 'a long description' \
                 WHERE `name` LIKE 'Foo'",
                "UPDATE `1_8` AS `raw_1_8` SET `side` = 'CLIENT' WHERE `name` LIKE 'Bar'",
            ]
        );
    }

    #[test]
    fn test_retain_versions_filters_skipped_rows() {
        let seq = seq();
        let mut acc = PatchAccumulator::new(&seq);
        acc.add_file("global.csv", "name,description\nEmpty,\n@@1.9\nAlsoEmpty,\n")
            .unwrap();
        let table = acc.finish();

        let naming = TableNaming::default();
        let mut plan = StatementCompiler::new(&seq, &naming, &MySql).compile_table(&table);
        assert_eq!(plan.skipped_total(), 4);

        plan.retain_versions(&[v("1.9")]);
        assert_eq!(plan.skipped_total(), 2);
        assert_eq!(plan.skipped.get(&v("1.9")), Some(&2));
    }
}
