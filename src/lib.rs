//! Forge Patcher: versioned patch compiler
//!
//! Compiles CSV-like patch files written against a range of product versions
//! into per-version SQL `UPDATE` statements.
//!
//! # Architecture
//!
//! - [`version`] orders version identifiers and resolves `@@` range
//!   directives against the configured [`VersionSequence`].
//! - [`patch`] parses rows and accumulates patch files into a [`PatchTable`]
//!   holding, for every version, its rows in application order.
//! - [`sql`] compiles each row into a [`CompiledStatement`], supporting
//!   `@version@` cross-version references and `@+` fill-if-empty updates, and
//!   applies plans through a [`StatementExecutor`].
//!
//! Compilation is pure. Execution is sequential per version table, because a
//! fill-if-empty update must see the effects of the statements before it.
//!
//! # Example
//!
//! ```
//! use forge_patcher::patch::PatchAccumulator;
//! use forge_patcher::sql::{MySql, StatementCompiler, TableNaming};
//! use forge_patcher::version::{Version, VersionSequence};
//!
//! let versions = VersionSequence::parse(["1.7", "1.8"]).unwrap();
//! let mut accumulator = PatchAccumulator::new(&versions);
//! accumulator
//!     .add_file("global.csv", "name,description\nFoo,@+@1.7@ legacy\n")
//!     .unwrap();
//! let table = accumulator.finish();
//!
//! let naming = TableNaming::default();
//! let compiler = StatementCompiler::new(&versions, &naming, &MySql);
//! let plan = compiler.compile_table(&table);
//!
//! let target = Version::parse("1.8").unwrap();
//! let sql = plan.statements[&target][0].to_sql(&MySql);
//! assert!(sql.starts_with("UPDATE `1_8` AS `raw_1_8` CROSS JOIN `1_7` AS `raw_1_7`"));
//! ```

pub mod config;
pub mod output;
pub mod patch;
pub mod project;
pub mod report;
pub mod sql;
pub mod version;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, ProjectConfig};
pub use output::{write_script, OutputError, WriteResult};
pub use patch::{
    parse_row, ColumnHeader, PatchAccumulator, PatchFileError, PatchRow, PatchTable,
};
pub use project::{compile_project, render_plan, Compilation, ProjectError};
pub use report::Report;
pub use sql::{
    apply_plan, CompileError, CompiledPlan, CompiledStatement, ExecError, ExecPolicy, SqlDialect,
    StatementCompiler, StatementExecutor,
};
pub use version::{resolve_range, RangeError, Version, VersionError, VersionSequence};
