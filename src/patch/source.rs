//! Patch files on disk.
//!
//! A patch directory holds `global.csv`, whose rows apply to every version,
//! and `<version>.csv` files whose rows start out scoped to that version.
//! Any other `.csv` file is treated like `global.csv`. Files are accumulated
//! global first, then the remaining global files by name, then version files
//! in version order, so for each version global rows come before local ones.

use super::table::{PatchAccumulator, PatchFileError, PatchTable};
use crate::output::{atomic_write, OutputError};
use crate::version::{Version, VersionSequence};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const GLOBAL_FILE: &str = "global.csv";
const PATCH_EXTENSION: &str = "csv";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("patch directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk patch directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceScope {
    Global,
    Version(Version),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSource {
    pub path: PathBuf,
    /// File name used in reports
    pub name: String,
    pub scope: SourceScope,
}

/// List the patch files of `dir` in accumulation order.
pub fn discover_sources(
    dir: &Path,
    sequence: &VersionSequence,
) -> Result<Vec<PatchSource>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::MissingDirectory(dir.to_path_buf()));
    }

    let mut global = Vec::new();
    let mut local = Vec::new();

    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|s| s.to_str()) != Some(PATCH_EXTENSION)
        {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()).map(str::to_string) else {
            tracing::warn!(path = %path.display(), "skipping patch file with non UTF-8 name");
            continue;
        };
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        match Version::parse(stem) {
            Ok(version) => match sequence.get(&version) {
                Some(known) => local.push(PatchSource {
                    path: path.to_path_buf(),
                    name,
                    scope: SourceScope::Version(known.clone()),
                }),
                None => {
                    tracing::warn!(file = %name, "skipping patch file for unknown version");
                }
            },
            Err(_) => global.push(PatchSource {
                path: path.to_path_buf(),
                name,
                scope: SourceScope::Global,
            }),
        }
    }

    global.sort_by(|a, b| {
        (a.name != GLOBAL_FILE)
            .cmp(&(b.name != GLOBAL_FILE))
            .then_with(|| a.name.cmp(&b.name))
    });
    local.sort_by(|a, b| match (&a.scope, &b.scope) {
        (SourceScope::Version(x), SourceScope::Version(y)) => {
            x.cmp(y).then_with(|| a.name.cmp(&b.name))
        }
        _ => a.name.cmp(&b.name),
    });

    global.extend(local);
    Ok(global)
}

/// Read and accumulate `sources` in order.
///
/// Directive errors abandon the rest of the offending file and are returned
/// next to the table; I/O errors are fatal.
pub fn accumulate_sources(
    sources: &[PatchSource],
    sequence: &VersionSequence,
) -> Result<(PatchTable, Vec<PatchFileError>), SourceError> {
    let mut accumulator = PatchAccumulator::new(sequence);
    let mut failures = Vec::new();

    for source in sources {
        let contents = fs::read_to_string(&source.path).map_err(|e| SourceError::Io {
            path: source.path.clone(),
            source: e,
        })?;
        let result = match &source.scope {
            SourceScope::Global => accumulator.add_file(&source.name, &contents),
            SourceScope::Version(version) => {
                accumulator.add_file_scoped(&source.name, &contents, vec![version.clone()])
            }
        };
        if let Err(error) = result {
            tracing::warn!(%error, "abandoning rest of patch file");
            failures.push(error);
        }
    }

    Ok((accumulator.finish(), failures))
}

/// Create `global.csv` and one `<version>.csv` per version, each holding only
/// `header`. Existing files are left alone. Returns the files created.
pub fn scaffold(
    dir: &Path,
    sequence: &VersionSequence,
    header: &str,
) -> Result<Vec<PathBuf>, SourceError> {
    fs::create_dir_all(dir).map_err(|e| SourceError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let names = std::iter::once(GLOBAL_FILE.to_string())
        .chain(sequence.iter().map(|v| format!("{v}.{PATCH_EXTENSION}")));

    let mut created = Vec::new();
    for name in names {
        let path = dir.join(name);
        if path.exists() {
            continue;
        }
        atomic_write(&path, format!("{header}\n").as_bytes())?;
        tracing::info!(path = %path.display(), "created patch file");
        created.push(path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seq() -> VersionSequence {
        VersionSequence::parse(["1.7.10", "1.8", "1.8.9"]).unwrap()
    }

    fn names(sources: &[PatchSource]) -> Vec<&str> {
        sources.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_discovery_order() {
        let dir = TempDir::new().unwrap();
        for name in [
            "1.8.9.csv",
            "zz-extra.csv",
            "global.csv",
            "1.7.10.csv",
            "aa-extra.csv",
            "notes.txt",
            "1.8.csv",
        ] {
            fs::write(dir.path().join(name), "name\n").unwrap();
        }

        let sources = discover_sources(dir.path(), &seq()).unwrap();
        assert_eq!(
            names(&sources),
            [
                "global.csv",
                "aa-extra.csv",
                "zz-extra.csv",
                "1.7.10.csv",
                "1.8.csv",
                "1.8.9.csv"
            ]
        );
        assert_eq!(sources[0].scope, SourceScope::Global);
        assert_eq!(
            sources[3].scope,
            SourceScope::Version(Version::parse("1.7.10").unwrap())
        );
    }

    #[test]
    fn test_unknown_version_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2.0.csv"), "name\n").unwrap();
        fs::write(dir.path().join("global.csv"), "name\n").unwrap();
        let sources = discover_sources(dir.path(), &seq()).unwrap();
        assert_eq!(names(&sources), ["global.csv"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover_sources(&dir.path().join("nope"), &seq()).unwrap_err();
        assert!(matches!(err, SourceError::MissingDirectory(_)));
    }

    #[test]
    fn test_global_rows_precede_local_rows() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.8.csv"), "name,description\nLocal,l\n").unwrap();
        fs::write(dir.path().join("global.csv"), "name,description\nGlobal,g\n").unwrap();

        let seq = seq();
        let sources = discover_sources(dir.path(), &seq).unwrap();
        let (table, failures) = accumulate_sources(&sources, &seq).unwrap();
        assert!(failures.is_empty());

        let keys = |v: &str| -> Vec<String> {
            table
                .rows_for(&Version::parse(v).unwrap())
                .map(|r| r.key().to_string())
                .collect()
        };
        assert_eq!(keys("1.8"), ["Global", "Local"]);
        assert_eq!(keys("1.7.10"), ["Global"]);
    }

    #[test]
    fn test_directive_failure_is_collected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("global.csv"),
            "name,description\nA,1\n@@9.9\nB,2\n",
        )
        .unwrap();
        fs::write(dir.path().join("1.8.csv"), "name,description\nC,3\n").unwrap();

        let seq = seq();
        let sources = discover_sources(dir.path(), &seq).unwrap();
        let (table, failures) = accumulate_sources(&sources, &seq).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file(), "global.csv");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_scaffold_creates_missing_files_only() {
        let dir = TempDir::new().unwrap();
        let patches = dir.path().join("patches");
        fs::create_dir(&patches).unwrap();
        fs::write(patches.join("1.8.csv"), "name,description\nKeep,me\n").unwrap();

        let created = scaffold(&patches, &seq(), "name,description").unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(
            fs::read_to_string(patches.join("global.csv")).unwrap(),
            "name,description\n"
        );
        assert!(fs::read_to_string(patches.join("1.8.csv"))
            .unwrap()
            .contains("Keep,me"));

        assert!(scaffold(&patches, &seq(), "name").unwrap().is_empty());
    }
}
