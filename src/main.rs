use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use forge_patcher::config::{load_from_path, ProjectConfig, DEFAULT_CONFIG_FILE};
use forge_patcher::output::{render_script, write_script, WriteResult};
use forge_patcher::patch::scaffold;
use forge_patcher::project::{compile_project, render_plan, Compilation};
use forge_patcher::report::Report;
use forge_patcher::version::resolve_range;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forge-patcher")]
#[command(about = "Compile versioned CSV patches into SQL update scripts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the project config (defaults to ./forge-patcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log compiled statements and directive resolution
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile all patch files into a SQL script
    Compile {
        /// Script to write (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only emit statements for versions matching this range expression
        #[arg(long)]
        only: Option<String>,

        /// Show unified diff against the previous script
        #[arg(short, long)]
        diff: bool,

        /// Write a JSON failure report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compile without writing anything and report failures
    Check {
        /// Write a JSON failure report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the versions a range expression resolves to
    Resolve {
        /// Range expression, e.g. "1.8++" or "1.7.10-1.8.9;1.12.2"
        expression: String,
    },

    /// Create missing global and per-version patch files
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Compile {
            output,
            only,
            diff,
            report,
        } => cmd_compile(&config, output, only, diff, report),

        Commands::Check { report } => cmd_check(&config, report),

        Commands::Resolve { expression } => cmd_resolve(&config, &expression),

        Commands::Init => cmd_init(&config),
    }
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("FORGE_PATCHER_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("forge_patcher=debug")
        } else {
            EnvFilter::new("forge_patcher=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Helper: load the config given on the command line or from the working directory
fn load_config(path: Option<PathBuf>) -> Result<ProjectConfig> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        anyhow::bail!(
            "{}\n{}\n  {}\n  {}",
            format!("Config file not found: {}", path.display()).red(),
            "Try one of:".bold(),
            "1. Run from the directory holding forge-patcher.toml",
            "2. Specify explicitly: forge-patcher --config /path/to/forge-patcher.toml <command>"
        );
    }
    Ok(load_from_path(&path)?)
}

/// Helper: Show unified diff between the previous and the new script
fn display_diff(file: &Path, original: &str, modified: &str) {
    eprintln!(
        "\n{}",
        format!("--- {} (previous)", file.display()).dimmed()
    );
    eprintln!("{}", format!("+++ {} (compiled)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        eprint!("{}", sign);
    }
}

/// Helper: print every failure of a run to stderr
fn print_failures(compilation: &Compilation) {
    for failure in &compilation.file_failures {
        eprintln!("{} {}", "✗".red(), failure);
        eprintln!("  Remaining lines of {} were not applied", failure.file());
    }
    for failure in &compilation.plan.failures {
        eprintln!(
            "{} {}:{} [{}]: {}",
            "✗".red(),
            failure.source.file,
            failure.source.line,
            failure.version,
            failure.error
        );
        eprintln!("  Row: {}", failure.text.dimmed());
    }
}

fn write_report(report: &Report, path: Option<PathBuf>) -> Result<()> {
    if let Some(path) = path {
        let json = report.to_json()?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &Report, files: usize) {
    eprintln!("{}", "Summary:".bold());
    eprintln!("  {} patch files", files);
    eprintln!("  {} statements", format!("{}", report.statements).green());
    eprintln!(
        "  {} rows with nothing to set",
        format!("{}", report.skipped_rows).cyan()
    );
    eprintln!(
        "  {} files abandoned",
        format!("{}", report.files.len()).yellow()
    );
    eprintln!("  {} rows failed", format!("{}", report.rows.len()).red());
}

fn cmd_compile(
    config: &ProjectConfig,
    output: Option<PathBuf>,
    only: Option<String>,
    show_diff: bool,
    report_path: Option<PathBuf>,
) -> Result<()> {
    // 1. Accumulate and compile
    let mut compilation = compile_project(config)?;

    // 2. Restrict to the requested versions
    if let Some(expression) = only {
        let versions = resolve_range(&expression, &compilation.sequence)
            .with_context(|| format!("invalid --only expression '{expression}'"))?;
        compilation.plan.retain_versions(&versions);
    }

    // 3. Render the script
    let dialect = config.sql.dialect.dialect();
    let (body, applied) = render_plan(&compilation.plan, dialect);

    let mut report = Report::new(&compilation.plan, &compilation.file_failures);
    report.record_execution(&applied);

    // 4. Write or print it
    match output {
        Some(path) => {
            let previous = fs::read_to_string(&path).ok();
            match write_script(&path, &body)? {
                WriteResult::Written { path, bytes } => {
                    eprintln!(
                        "{} Wrote {} ({} bytes)",
                        "✓".green(),
                        path.display(),
                        bytes
                    );
                    if show_diff {
                        display_diff(
                            &path,
                            previous.as_deref().unwrap_or(""),
                            &render_script(&body),
                        );
                    }
                }
                WriteResult::Unchanged { path } => {
                    eprintln!("{} {} is up to date", "⊙".yellow(), path.display());
                }
            }
        }
        None => print!("{}", render_script(&body)),
    }

    // 5. Report
    print_failures(&compilation);
    for failure in &applied.failures {
        eprintln!("{} {}", "✗".red(), failure);
    }
    write_report(&report, report_path)?;
    print_summary(&report, compilation.files);

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(config: &ProjectConfig, report_path: Option<PathBuf>) -> Result<()> {
    let compilation = compile_project(config)?;
    let report = Report::new(&compilation.plan, &compilation.file_failures);

    print_failures(&compilation);
    write_report(&report, report_path)?;
    print_summary(&report, compilation.files);

    if report.has_failures() {
        std::process::exit(1);
    }

    println!("{} All patches compile", "✓".green());
    Ok(())
}

fn cmd_resolve(config: &ProjectConfig, expression: &str) -> Result<()> {
    let sequence = config.version_sequence()?;
    let versions = resolve_range(expression, &sequence)
        .with_context(|| format!("cannot resolve '{expression}'"))?;
    for version in versions {
        println!("{version}");
    }
    Ok(())
}

fn cmd_init(config: &ProjectConfig) -> Result<()> {
    let sequence = config.version_sequence()?;
    let created = scaffold(&config.patch_dir, &sequence, &config.header)?;

    if created.is_empty() {
        println!(
            "{} All patch files already exist in {}",
            "⊙".yellow(),
            config.patch_dir.display()
        );
    }
    for path in created {
        println!("{} Created {}", "✓".green(), path.display());
    }
    Ok(())
}
