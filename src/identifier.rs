//! SQL identifier handling.
//!
//! JSON keys are user-controlled, so every key that lands in an identifier
//! position of generated SQL goes through [`sanitize_identifier`] first.
//! Sanitizing is not injective: `"a.b"` and `"a b"` both become `"a_b"`.
//! Callers that build tables and rows from sanitized names accept that two
//! keys may collide.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("static pattern compiles"));

/// Replace every maximal run of characters outside `[A-Za-z0-9_]` with a
/// single underscore.
///
/// # Examples
///
/// ```
/// use json_to_sqlite::identifier::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("a.b c!"), "a_b_c_");
/// assert_eq!(sanitize_identifier("user_id"), "user_id");
/// ```
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    NON_WORD_RUN.replace_all(raw, "_").into_owned()
}

/// Wrap an identifier in double quotes for use in SQL text.
///
/// Embedded quotes are doubled, so this is safe even for names that did not
/// go through [`sanitize_identifier`].
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_into_one_underscore() {
        assert_eq!(sanitize_identifier("a...b"), "a_b");
        assert_eq!(sanitize_identifier("first name"), "first_name");
        assert_eq!(sanitize_identifier("@type"), "_type");
    }

    #[test]
    fn keeps_existing_underscores() {
        assert_eq!(sanitize_identifier("a._b"), "a__b");
        assert_eq!(sanitize_identifier("__x__"), "__x__");
    }

    #[test]
    fn non_ascii_is_replaced() {
        assert_eq!(sanitize_identifier("café"), "caf_");
        assert_eq!(sanitize_identifier("日本"), "_");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(sanitize_identifier(""), "");
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier("root"), "\"root\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
