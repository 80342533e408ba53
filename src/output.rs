//! Writing compiled SQL scripts to disk.
//!
//! Scripts start with an xxh3 fingerprint of their body. Writing a script
//! whose fingerprint matches the file already on disk is a no-op, so repeated
//! compilations of unchanged patches leave the output untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

pub const FINGERPRINT_PREFIX: &str = "-- forge-patcher xxh3:";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl OutputError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "WriteResult tells whether the file changed"]
pub enum WriteResult {
    Written { path: PathBuf, bytes: usize },
    /// The file already held a script with the same fingerprint
    Unchanged { path: PathBuf },
}

pub fn fingerprint(body: &str) -> u64 {
    xxh3_64(body.as_bytes())
}

/// Prefix `body` with its fingerprint line.
pub fn render_script(body: &str) -> String {
    format!("{FINGERPRINT_PREFIX}{:016x}\n{body}", fingerprint(body))
}

/// Fingerprint recorded on the first line of an existing script.
pub fn read_fingerprint(contents: &str) -> Option<u64> {
    let first = contents.lines().next()?;
    let hex = first.strip_prefix(FINGERPRINT_PREFIX)?;
    u64::from_str_radix(hex.trim(), 16).ok()
}

/// Write a script body to `path` unless an identical script is already there.
pub fn write_script(path: &Path, body: &str) -> Result<WriteResult, OutputError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if read_fingerprint(&existing) == Some(fingerprint(body)) {
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
    }

    let script = render_script(body);
    atomic_write(path, script.as_bytes())?;
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        bytes: script.len(),
    })
}

/// Tempfile in the target directory, fsync, then rename over `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), OutputError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(OutputError::io(path))?;
    temp.write_all(content).map_err(OutputError::io(path))?;
    temp.as_file().sync_all().map_err(OutputError::io(path))?;
    temp.persist(path)
        .map_err(|e| OutputError::io(path)(e.error))?;
    Ok(())
}
