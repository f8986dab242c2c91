//! Identifier escaping rules
//!
//! ksqlDB upper-cases unquoted identifiers and rejects reserved words unless
//! they are wrapped in backticks. [`IdentifierEscaping`] controls how column,
//! source and alias names are rendered into statement text.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How identifiers are rendered into statement text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierEscaping {
    /// Identifiers are emitted as written.
    #[default]
    Never,
    /// Only reserved words and names that are not valid identifiers are quoted.
    Keywords,
    /// Every identifier is quoted.
    Always,
}

/// Implicit columns every source carries. These are always quoted.
pub const PSEUDO_COLUMNS: &[&str] = &[
    "ROWTIME",
    "ROWOFFSET",
    "ROWPARTITION",
    "WINDOWSTART",
    "WINDOWEND",
];

/// Reserved words of the ksqlDB grammar.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "ADD", "ADVANCE", "ALL", "ALTER", "AND", "ARRAY", "AS", "ASSERT", "AT", "BETWEEN", "BY",
    "CASE", "CAST", "CHANGES", "COLUMN", "COLUMNS", "CONNECTOR", "CONNECTORS", "CREATE", "DATE",
    "DAY", "DAYS", "DECIMAL", "DELETE", "DESCRIBE", "DISTINCT", "DROP", "ELSE", "EMIT", "END",
    "ESCAPE", "EXISTS", "EXPLAIN", "EXTENDED", "FALSE", "FINAL", "FROM", "FULL", "FUNCTION",
    "FUNCTIONS", "GRACE", "GROUP", "HAVING", "HEADER", "HEADERS", "HOPPING", "HOUR", "HOURS",
    "IF", "IN", "INNER", "INSERT", "INTEGER", "INTERVAL", "INTO", "IS", "JOIN", "KEY", "LEFT",
    "LIKE", "LIMIT", "LIST", "LOAD", "MAP", "MILLISECOND", "MILLISECONDS", "MINUTE", "MINUTES",
    "MONTH", "MONTHS", "NOT", "NULL", "ON", "OR", "OUTER", "PARTITION", "PARTITIONS", "PERIOD",
    "PRIMARY", "PROPERTIES", "QUERIES", "QUERY", "REPLACE", "RESET", "RETENTION", "RIGHT",
    "RUN", "SCHEMA", "SCRIPT", "SECOND", "SECONDS", "SELECT", "SESSION", "SET", "SHOW", "SINK",
    "SIZE", "SOURCE", "STREAM", "STREAMS", "STRUCT", "TABLE", "TABLES", "TERMINATE", "THEN",
    "TIME", "TIMEOUT", "TIMESTAMP", "TOPIC", "TOPICS", "TRUE", "TUMBLING", "TYPE", "TYPES",
    "UNSET", "VALUES", "WHEN", "WHERE", "WINDOW", "WITH", "WITHIN", "YEAR", "YEARS", "ZONE",
];

/// Returns true when `name` is one of the implicit pseudo-columns.
pub fn is_pseudo_column(name: &str) -> bool {
    PSEUDO_COLUMNS.iter().any(|p| p.eq_ignore_ascii_case(name))
}

/// Returns true when `name` is a reserved word (case-insensitive).
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Returns true when `name` can be used unquoted: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('`') && name.ends_with('`')
}

fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render an identifier according to `mode`.
///
/// Pseudo-columns are always quoted, names that already carry backticks are
/// passed through untouched.
pub fn escape(name: &str, mode: IdentifierEscaping) -> Cow<'_, str> {
    if is_quoted(name) {
        return Cow::Borrowed(name);
    }

    if is_pseudo_column(name) {
        return Cow::Owned(quote(&name.to_ascii_uppercase()));
    }

    let needs_quotes = match mode {
        IdentifierEscaping::Never => false,
        IdentifierEscaping::Always => true,
        IdentifierEscaping::Keywords => is_reserved_keyword(name) || !is_valid_identifier(name),
    };

    if needs_quotes {
        Cow::Owned(quote(name))
    } else {
        Cow::Borrowed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_leaves_names_untouched() {
        assert_eq!(escape("Title", IdentifierEscaping::Never), "Title");
        assert_eq!(escape("Select", IdentifierEscaping::Never), "Select");
        assert_eq!(escape("my field", IdentifierEscaping::Never), "my field");
    }

    #[test]
    fn test_always_quotes_everything() {
        assert_eq!(escape("Title", IdentifierEscaping::Always), "`Title`");
        assert_eq!(escape("Select", IdentifierEscaping::Always), "`Select`");
    }

    #[test]
    fn test_keywords_mode() {
        assert_eq!(escape("Title", IdentifierEscaping::Keywords), "Title");
        assert_eq!(escape("Select", IdentifierEscaping::Keywords), "`Select`");
        assert_eq!(escape("limit", IdentifierEscaping::Keywords), "`limit`");
        assert_eq!(escape("1st", IdentifierEscaping::Keywords), "`1st`");
        assert_eq!(escape("my-field", IdentifierEscaping::Keywords), "`my-field`");
    }

    #[test]
    fn test_pseudo_columns_quoted_in_every_mode() {
        for mode in [
            IdentifierEscaping::Never,
            IdentifierEscaping::Keywords,
            IdentifierEscaping::Always,
        ] {
            assert_eq!(escape("RowTime", mode), "`ROWTIME`");
            assert_eq!(escape("WINDOWSTART", mode), "`WINDOWSTART`");
        }
    }

    #[test]
    fn test_already_quoted_passthrough() {
        assert_eq!(escape("`Title`", IdentifierEscaping::Always), "`Title`");
    }

    #[test]
    fn test_embedded_backtick_doubled() {
        assert_eq!(escape("a`b", IdentifierEscaping::Always), "`a``b`");
    }

    #[test]
    fn test_valid_identifier_grammar() {
        assert!(is_valid_identifier("_id"));
        assert!(is_valid_identifier("Release_Year2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier("a.b"));
    }
}
