//! Version-range expressions used by `@@` directive lines.
//!
//! An expression is a `;`-separated list of tokens, and anything after the
//! first `,` is a comment:
//!
//! | token   | versions                          |
//! |---------|-----------------------------------|
//! | `@`     | every known version               |
//! | `A--`   | every version up to and including A |
//! | `A++`   | every version from A onwards      |
//! | `A-B`   | the inclusive slice from A to B   |
//! | `A`     | A alone                           |
//!
//! Tokens are lexed as a version identifier followed by an operator suffix, so
//! the operators are never searched for inside the identifier itself.

use super::{Version, VersionError, VersionSequence};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error("unknown version '{version}'{}", hint(.suggestion))]
    UnknownVersion {
        version: String,
        suggestion: Option<String>,
    },

    #[error("illegal range '{token}': {reason}")]
    IllegalRange { token: String, reason: String },
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

/// One lexed token of a range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeToken {
    All,
    UpTo(Version),
    From(Version),
    Between(Version, Version),
    Single(Version),
}

impl RangeToken {
    pub fn parse(token: &str) -> Result<Self, RangeError> {
        let token = token.trim();
        let illegal = |reason: &str| RangeError::IllegalRange {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        if token.is_empty() {
            return Err(illegal("empty token"));
        }
        if token == "@" {
            return Ok(RangeToken::All);
        }

        let split = token
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(token.len());
        let (ident, suffix) = token.split_at(split);
        let suffix = suffix.trim_start();
        if ident.is_empty() {
            if suffix.starts_with('-') || suffix.starts_with('+') {
                return Err(illegal("missing version before operator"));
            }
            return Err(unexpected_text(token, suffix));
        }

        let first = Version::parse(ident)?;
        match suffix {
            "" => Ok(RangeToken::Single(first)),
            "--" => Ok(RangeToken::UpTo(first)),
            "++" => Ok(RangeToken::From(first)),
            _ => match suffix.strip_prefix('-') {
                Some(second) if second.contains('-') => {
                    Err(illegal("expected exactly two versions around '-'"))
                }
                Some(second) if second.trim().is_empty() => {
                    Err(illegal("expected exactly two versions around '-'"))
                }
                Some(second) => Ok(RangeToken::Between(first, Version::parse(second)?)),
                None => Err(unexpected_text(token, suffix)),
            },
        }
    }
}

fn unexpected_text(token: &str, rest: &str) -> RangeError {
    RangeError::InvalidVersion(VersionError::InvalidVersion {
        value: token.to_string(),
        reason: format!("unexpected text '{rest}'"),
    })
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeToken::All => write!(f, "@"),
            RangeToken::UpTo(v) => write!(f, "{v}--"),
            RangeToken::From(v) => write!(f, "{v}++"),
            RangeToken::Between(a, b) => write!(f, "{a}-{b}"),
            RangeToken::Single(v) => write!(f, "{v}"),
        }
    }
}

/// Strip the comment from a directive expression and lex its tokens.
pub fn parse_expression(expression: &str) -> Result<Vec<RangeToken>, RangeError> {
    let significant = expression.split(',').next().unwrap_or("").trim();
    if significant.is_empty() {
        return Err(RangeError::IllegalRange {
            token: expression.to_string(),
            reason: "empty range expression".to_string(),
        });
    }

    significant
        .split(';')
        .filter(|token| !token.trim().is_empty())
        .map(RangeToken::parse)
        .collect()
}

/// Expand a range expression into the versions it covers, in the order the
/// tokens were written. Overlapping tokens yield duplicates.
///
/// # Examples
///
/// ```
/// use forge_patcher::version::{resolve_range, VersionSequence};
///
/// let seq = VersionSequence::parse(["1.7", "1.8", "1.9"]).unwrap();
/// let names = |expr: &str| -> Vec<String> {
///     resolve_range(expr, &seq).unwrap().iter().map(|v| v.to_string()).collect()
/// };
///
/// assert_eq!(names("1.8--"), ["1.7", "1.8"]);
/// assert_eq!(names("1.8++"), ["1.8", "1.9"]);
/// assert_eq!(names("1.7-1.9"), ["1.7", "1.8", "1.9"]);
/// assert_eq!(names("@"), ["1.7", "1.8", "1.9"]);
/// assert!(resolve_range("2.0", &seq).is_err());
/// ```
pub fn resolve_range(
    expression: &str,
    sequence: &VersionSequence,
) -> Result<Vec<Version>, RangeError> {
    let mut resolved = Vec::new();
    for token in parse_expression(expression)? {
        resolved.extend_from_slice(resolve_token(&token, sequence)?);
    }
    Ok(resolved)
}

fn resolve_token<'a>(
    token: &RangeToken,
    sequence: &'a VersionSequence,
) -> Result<&'a [Version], RangeError> {
    let versions = sequence.as_slice();
    match token {
        RangeToken::All => Ok(versions),
        RangeToken::UpTo(v) => Ok(&versions[..=lookup(v, sequence)?]),
        RangeToken::From(v) => Ok(&versions[lookup(v, sequence)?..]),
        RangeToken::Single(v) => {
            let idx = lookup(v, sequence)?;
            Ok(&versions[idx..=idx])
        }
        RangeToken::Between(a, b) => {
            let start = lookup(a, sequence)?;
            let end = lookup(b, sequence)?;
            if start > end {
                return Err(RangeError::IllegalRange {
                    token: token.to_string(),
                    reason: format!("'{a}' comes after '{b}'"),
                });
            }
            Ok(&versions[start..=end])
        }
    }
}

fn lookup(version: &Version, sequence: &VersionSequence) -> Result<usize, RangeError> {
    sequence
        .position(version)
        .ok_or_else(|| RangeError::UnknownVersion {
            version: version.to_string(),
            suggestion: sequence.suggest(version.as_str()).map(Version::to_string),
        })
}
