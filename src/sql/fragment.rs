//! Splitting patch values into literal text and `@version@` references.

use thiserror::Error;

/// A piece of a patch value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
    Literal(&'a str),
    /// Name of the version whose same-named column is substituted
    Reference(&'a str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'@' at byte {offset} opens a reference that is never closed")]
pub struct UnfinishedReference {
    pub offset: usize,
}

enum State {
    Outside { start: usize },
    Inside { start: usize },
}

/// Scan `value` into fragments. Empty literals are dropped, so an empty
/// value yields no fragments; an empty reference (`@@`) is kept.
///
/// # Examples
///
/// ```
/// use forge_patcher::sql::fragment::{scan, Fragment};
///
/// assert_eq!(
///     scan("@1.8@-text").unwrap(),
///     vec![Fragment::Reference("1.8"), Fragment::Literal("-text")]
/// );
/// assert!(scan("open @1.8").is_err());
/// ```
pub fn scan(value: &str) -> Result<Vec<Fragment<'_>>, UnfinishedReference> {
    let mut fragments = Vec::new();
    let mut state = State::Outside { start: 0 };

    for (idx, c) in value.char_indices() {
        if c != '@' {
            continue;
        }
        state = match state {
            State::Outside { start } => {
                if idx > start {
                    fragments.push(Fragment::Literal(&value[start..idx]));
                }
                State::Inside { start: idx + 1 }
            }
            State::Inside { start } => {
                fragments.push(Fragment::Reference(&value[start..idx]));
                State::Outside { start: idx + 1 }
            }
        };
    }

    match state {
        State::Outside { start } => {
            if start < value.len() {
                fragments.push(Fragment::Literal(&value[start..]));
            }
            Ok(fragments)
        }
        State::Inside { start } => Err(UnfinishedReference { offset: start - 1 }),
    }
}
