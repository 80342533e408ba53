//! Value escaping and identifier quoting for the target store.

use super::TableRef;
use serde::Deserialize;

/// The store-specific primitives the compiler relies on.
///
/// Every literal reaching a statement goes through [`SqlDialect::escape`] and
/// every identifier through [`SqlDialect::quote_identifier`].
pub trait SqlDialect {
    /// Render `value` as a quoted string literal.
    fn escape(&self, value: &str) -> String;

    fn quote_identifier(&self, name: &str) -> String;

    /// Concatenate already rendered expressions.
    fn concat(&self, parts: &[String]) -> String;

    /// Whether referenced version tables are joined into the UPDATE target.
    /// When they are not, references read through [`SqlDialect::scalar_reference`]
    /// and only the primary table is named after `UPDATE`.
    fn joins_references(&self) -> bool {
        true
    }

    /// Case-insensitive pattern match of `lhs` against an escaped key literal.
    fn key_match(&self, lhs: &str, key: &str) -> String {
        format!("{lhs} LIKE {key}")
    }

    /// The `column` value of the row matching `key` in `table`.
    fn scalar_reference(
        &self,
        table: &TableRef,
        column: &str,
        key_column: &str,
        key: &str,
    ) -> String {
        format!(
            "(SELECT {} FROM {} WHERE {})",
            self.qualified(&table.alias, column),
            self.table_ref(table),
            self.key_match(&self.qualified(&table.alias, key_column), key)
        )
    }

    /// `"table" AS "alias"`
    fn table_ref(&self, table: &TableRef) -> String {
        format!(
            "{} AS {}",
            self.quote_identifier(&table.table),
            self.quote_identifier(&table.alias)
        )
    }

    /// Target list of an UPDATE: the primary table first, joined to the
    /// referenced tables with explicit `CROSS JOIN`s. The WHERE clause
    /// constrains every joined table to the row's key.
    fn table_refs(&self, tables: &[TableRef]) -> String {
        tables
            .iter()
            .map(|t| self.table_ref(t))
            .collect::<Vec<_>>()
            .join(" CROSS JOIN ")
    }

    /// `alias.column`
    fn qualified(&self, alias: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(alias),
            self.quote_identifier(column)
        )
    }

    /// Full statement text for the executor contract.
    fn update_statement(&self, tables: &[TableRef], set_clause: &str, where_clause: &str) -> String {
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.table_refs(tables),
            set_clause,
            where_clause
        )
    }
}

/// MySQL / MariaDB: backtick identifiers, backslash escapes, `CONCAT()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl SqlDialect for MySql {
    fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\u{8}' => out.push_str("\\b"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\u{1a}' => out.push_str("\\Z"),
                '"' => out.push_str("\\\""),
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }
}

/// Standard SQL: double-quoted identifiers, doubled quotes, `||`.
///
/// Standard UPDATE has a single target table, so references to other
/// versions become scalar subqueries and keys compare through `LOWER()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn joins_references(&self) -> bool {
        false
    }

    fn key_match(&self, lhs: &str, key: &str) -> String {
        format!("LOWER({lhs}) LIKE LOWER({key})")
    }

    fn table_refs(&self, tables: &[TableRef]) -> String {
        tables
            .first()
            .map(|t| self.table_ref(t))
            .unwrap_or_default()
    }

    fn escape(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("({})", parts.join(" || "))
    }
}

/// Dialect selection as written in the configuration file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DialectKind {
    #[default]
    Mysql,
    Ansi,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::Mysql => &MySql,
            DialectKind::Ansi => &Ansi,
        }
    }
}
