//! Driver-specific SQL literal quoting.
//!
//! Every value interpolated into a generated statement passes through
//! [`quote`]. Identifiers (tables, columns) are not quoted.
//!
//! Empty text and NULL both become the empty-string literal `''`, never a
//! true SQL NULL.

use crate::models::{DriverKind, FieldValue};
use std::fmt::Write as _;

const EMPTY_LITERAL: &str = "''";

/// Render `value` as an SQL literal for `driver`.
pub fn quote(value: &FieldValue, driver: DriverKind) -> String {
    match value {
        FieldValue::Null => EMPTY_LITERAL.to_string(),
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Float(v) if v.is_finite() => v.to_string(),
        FieldValue::Float(v) => quote_text(&v.to_string(), driver),
        FieldValue::Bool(v) => if *v { "'1'" } else { "'0'" }.to_string(),
        FieldValue::Text(s) => quote_text(s, driver),
        FieldValue::Bytes(b) => quote_bytes(b, driver),
        FieldValue::Json(v) => quote_text(&v.to_string(), driver),
    }
}

fn quote_text(s: &str, driver: DriverKind) -> String {
    if s.is_empty() {
        return EMPTY_LITERAL.to_string();
    }
    match driver {
        DriverKind::MySql => quote_mysql(s),
        DriverKind::Postgres | DriverKind::Sqlite => quote_standard(s),
    }
}

/// Standard SQL: the only escape is a doubled single quote.
fn quote_standard(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// MySQL string literal with backslash escapes for control characters.
///
/// A single quote is doubled rather than backslash-escaped, so the literal
/// still ends where it should when the server runs with
/// `NO_BACKSLASH_ESCAPES`.
fn quote_mysql(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn quote_bytes(bytes: &[u8], driver: DriverKind) -> String {
    if bytes.is_empty() {
        return EMPTY_LITERAL.to_string();
    }
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail
        let _ = write!(hex, "{b:02X}");
    }
    match driver {
        DriverKind::MySql | DriverKind::Sqlite => format!("X'{hex}'"),
        DriverKind::Postgres => format!("'\\x{hex}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DriverKind; 3] = [DriverKind::MySql, DriverKind::Postgres, DriverKind::Sqlite];

    #[test]
    fn test_empty_and_null_become_empty_literal() {
        for driver in ALL {
            assert_eq!(quote(&FieldValue::Text(String::new()), driver), "''");
            assert_eq!(quote(&FieldValue::Null, driver), "''");
            assert_eq!(quote(&FieldValue::Bytes(Vec::new()), driver), "''");
        }
    }

    #[test]
    fn test_embedded_quote_follows_driver_convention() {
        let name = FieldValue::from("O'Brien");
        assert_eq!(quote(&name, DriverKind::MySql), "'O''Brien'");
        assert_eq!(quote(&name, DriverKind::Postgres), "'O''Brien'");
        assert_eq!(quote(&name, DriverKind::Sqlite), "'O''Brien'");
    }

    #[test]
    fn test_mysql_escapes_control_characters() {
        let value = FieldValue::from("a\\b\n\"c\"\0\x1a");
        assert_eq!(
            quote(&value, DriverKind::MySql),
            r#"'a\\b\n\"c\"\0\Z'"#
        );
    }

    #[test]
    fn test_injection_attempt_stays_inside_literal() {
        let value = FieldValue::from("x' OR '1'='1");
        assert_eq!(quote(&value, DriverKind::Sqlite), "'x'' OR ''1''=''1'");
    }

    /// Byte offset where a MySQL string literal starting at offset 0 closes.
    fn mysql_literal_end(literal: &str, backslash_escapes: bool) -> Option<usize> {
        let bytes = literal.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if backslash_escapes => i += 2,
                b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                b'\'' => return Some(i),
                _ => i += 1,
            }
        }
        None
    }

    #[test]
    fn test_mysql_trailing_backslash_before_quote_stays_inside_literal() {
        let value = FieldValue::from("x\\' OR 1=1 -- ");
        let quoted = quote(&value, DriverKind::MySql);
        assert_eq!(quoted, r"'x\\'' OR 1=1 -- '");

        for backslash_escapes in [true, false] {
            assert_eq!(
                mysql_literal_end(&quoted, backslash_escapes),
                Some(quoted.len() - 1),
                "backslash_escapes = {backslash_escapes}"
            );
        }
    }

    #[test]
    fn test_numbers_and_booleans() {
        assert_eq!(quote(&FieldValue::Int(5), DriverKind::MySql), "5");
        assert_eq!(quote(&FieldValue::Int(-12), DriverKind::Sqlite), "-12");
        assert_eq!(quote(&FieldValue::Float(2.5), DriverKind::Postgres), "2.5");
        assert_eq!(quote(&FieldValue::Float(f64::NAN), DriverKind::Postgres), "'NaN'");
        assert_eq!(quote(&FieldValue::Bool(true), DriverKind::MySql), "'1'");
        assert_eq!(quote(&FieldValue::Bool(false), DriverKind::Sqlite), "'0'");
    }

    #[test]
    fn test_bytes_use_hex_literals() {
        let bytes = FieldValue::Bytes(vec![0x00, 0xAB]);
        assert_eq!(quote(&bytes, DriverKind::MySql), "X'00AB'");
        assert_eq!(quote(&bytes, DriverKind::Sqlite), "X'00AB'");
        assert_eq!(quote(&bytes, DriverKind::Postgres), r"'\x00AB'");
    }

    #[test]
    fn test_json_is_quoted_as_text() {
        let doc = FieldValue::Json(serde_json::json!({"k": "it's"}));
        assert_eq!(quote(&doc, DriverKind::Postgres), r#"'{"k":"it''s"}'"#);
    }
}
