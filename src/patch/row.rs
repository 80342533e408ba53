//! Comma-delimited patch rows with backslash-escaped commas.
//!
//! `\,` is a literal comma and is unescaped in the field text. No other
//! escape exists and quotes carry no meaning.

/// Split one physical line into fields.
///
/// # Examples
///
/// ```
/// use forge_patcher::patch::parse_row;
///
/// assert_eq!(parse_row(r"a\,b,c"), vec!["a,b", "c"]);
/// assert_eq!(parse_row("single"), vec!["single"]);
/// assert_eq!(parse_row("Foo,,x"), vec!["Foo", "", "x"]);
/// ```
pub fn parse_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Join fields back into one line, escaping embedded commas.
pub fn join_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| field.as_ref().replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}
