//! End-to-end compilation of a configured project.

use crate::config::ProjectConfig;
use crate::patch::{accumulate_sources, discover_sources, PatchFileError, SourceError};
use crate::sql::{
    apply_plan, ApplyReport, CompiledPlan, ExecPolicy, ScriptExecutor, SqlDialect,
    StatementCompiler,
};
use crate::version::{VersionError, VersionSequence};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("invalid version list: {0}")]
    Version(#[from] VersionError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Everything one compilation run produced.
#[derive(Debug)]
pub struct Compilation {
    pub sequence: VersionSequence,
    pub plan: CompiledPlan,
    pub file_failures: Vec<PatchFileError>,
    pub files: usize,
}

/// Discover, accumulate and compile every patch file of the project.
pub fn compile_project(config: &ProjectConfig) -> Result<Compilation, ProjectError> {
    let sequence = config.version_sequence()?;
    let sources = discover_sources(&config.patch_dir, &sequence)?;
    let (table, file_failures) = accumulate_sources(&sources, &sequence)?;

    let naming = config.naming();
    let plan = StatementCompiler::new(&sequence, &naming, config.sql.dialect.dialect())
        .compile_table(&table);

    tracing::info!(
        files = sources.len(),
        rows = table.row_count(),
        statements = plan.statement_count(),
        failures = plan.failures.len() + file_failures.len(),
        "compiled project"
    );

    Ok(Compilation {
        sequence,
        plan,
        file_failures,
        files: sources.len(),
    })
}

/// Render a plan as a SQL script body.
pub fn render_plan(plan: &CompiledPlan, dialect: &dyn SqlDialect) -> (String, ApplyReport) {
    let mut executor = ScriptExecutor::new(Vec::new(), dialect);
    let report = apply_plan(plan, &mut executor, ExecPolicy::Continue);
    let body = String::from_utf8_lossy(&executor.into_inner()).into_owned();
    (body, report)
}
