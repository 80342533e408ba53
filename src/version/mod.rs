//! Version identifiers and the ordered sequence of known versions.
//!
//! Versions are dot-separated non-negative integers (`1.7.10`, `1.8`). They
//! compare segment by segment as numbers, and a shorter identifier is padded
//! with zeros, so `1.8` and `1.8.0` are the same version.

pub mod range;

pub use range::{resolve_range, RangeError, RangeToken};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },
}

/// A parsed product version.
///
/// The original spelling is kept for display and table naming; ordering,
/// equality and hashing only look at the numeric segments.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(VersionError::InvalidVersion {
                value: input.to_string(),
                reason: "empty version".to_string(),
            });
        }

        let segments = raw
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidVersion {
                        value: raw.to_string(),
                        reason: format!("segment '{segment}' is not a non-negative integer"),
                    });
                }
                segment.parse::<u64>().map_err(|e| VersionError::InvalidVersion {
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Identifier-safe form used in table names and aliases (`1.7.10` -> `1_7_10`).
    pub fn table_suffix(&self) -> String {
        self.raw.replace('.', "_")
    }

    /// Segments with trailing zeros removed; equal versions share this form.
    fn significant(&self) -> &[u64] {
        let len = self
            .segments
            .iter()
            .rposition(|&s| s != 0)
            .map_or(0, |idx| idx + 1);
        &self.segments[..len]
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for idx in 0..len {
            let a = self.segments.get(idx).copied().unwrap_or(0);
            let b = other.segments.get(idx).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

/// Compare two version strings, propagating parse failures.
///
/// # Examples
///
/// ```
/// use forge_patcher::version::compare_versions;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions("1.9.0", "1.10.0").unwrap(), Ordering::Less);
/// assert_eq!(compare_versions("1.8", "1.8.0").unwrap(), Ordering::Equal);
/// assert!(compare_versions("1.x", "1.8").is_err());
/// ```
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// All known versions, ascending and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSequence {
    versions: Vec<Version>,
}

impl VersionSequence {
    /// Build the sequence from already parsed versions.
    ///
    /// The sort is stable, so when two spellings denote the same version the
    /// first one supplied is kept.
    pub fn new(versions: impl IntoIterator<Item = Version>) -> Self {
        let mut versions: Vec<Version> = versions.into_iter().collect();
        versions.sort();
        let before = versions.len();
        versions.dedup();
        if versions.len() != before {
            tracing::warn!(
                dropped = before - versions.len(),
                "duplicate versions removed from version sequence"
            );
        }
        Self { versions }
    }

    pub fn parse<I, S>(items: I) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let versions = items
            .into_iter()
            .map(|item| Version::parse(item.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(versions))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn as_slice(&self) -> &[Version] {
        &self.versions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Version> {
        self.versions.iter()
    }

    /// Position of `version` in the sequence, if it is a member.
    pub fn position(&self, version: &Version) -> Option<usize> {
        self.versions.binary_search(version).ok()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.position(version).is_some()
    }

    /// The sequence's own spelling of `version`.
    pub fn get(&self, version: &Version) -> Option<&Version> {
        self.position(version).map(|idx| &self.versions[idx])
    }

    /// Closest known version by spelling, for error hints.
    pub fn suggest(&self, input: &str) -> Option<&Version> {
        self.versions
            .iter()
            .map(|v| (v, strsim::normalized_levenshtein(v.as_str(), input)))
            .filter(|(_, score)| *score >= 0.5)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(v, _)| v)
    }
}

impl<'a> IntoIterator for &'a VersionSequence {
    type Item = &'a Version;
    type IntoIter = std::slice::Iter<'a, Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}
