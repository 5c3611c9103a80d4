//! `%token%` indirection against the `[Strings]` section.

use crate::inf_file::{InfFile, first_segment};

pub const STRINGS_SECTION: &str = "Strings";

/// Resolves a display-string value through the string table.
///
/// A value wrapped in `%...%` is looked up (case-insensitively) as a key in
/// `[Strings]`; the stored value is unquoted and stripped to its first
/// `;`-delimited segment. A value that is not a token, or whose token is
/// absent from the table, is returned trimmed as-is.
pub fn resolve_string(inf: &InfFile, raw: &str) -> String {
    let trimmed = raw.trim();

    let token = trimmed
        .strip_prefix('%')
        .and_then(|inner| inner.strip_suffix('%'));

    let Some(token) = token else {
        return trimmed.to_owned();
    };

    match inf.section(STRINGS_SECTION).and_then(|s| s.get(token)) {
        Some(value) => first_segment(strip_quotes(value)).to_owned(),
        None => trimmed.to_owned(),
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
