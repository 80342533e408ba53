//! Patch files: row parsing, per-version accumulation and on-disk sources.
//!
//! A patch file is a header line followed by data lines and `@@<range>`
//! directive lines:
//!
//! ```text
//! name,description,side
//! FooEvent,Fired when foo happens,
//! @@1.8++, only newer releases
//! BarEvent,@+@1.7.10@ (unchanged since 1.7.10),CLIENT
//! ```

pub mod row;
pub mod source;
pub mod table;

pub use row::{join_row, parse_row};
pub use source::{
    accumulate_sources, discover_sources, scaffold, PatchSource, SourceError, SourceScope,
    GLOBAL_FILE,
};
pub use table::{
    ColumnHeader, FileSummary, PatchAccumulator, PatchFileError, PatchRow, PatchTable,
    RowSource, DIRECTIVE_PREFIX,
};
