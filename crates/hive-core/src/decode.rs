//! Lenient decoders for columns whose storage encoding is inconsistent.
//!
//! Role flags arrive as `true`, `"true"`, `1` or `"1"` depending on which code
//! path wrote the record; budgets and rates are stored as text. These helpers
//! turn all of that into real `bool` / `f64` at the row boundary so nothing
//! downstream sees the raw encodings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::normalize_flag;

/// Interpret a JSON value as a flag; anything unrecognized is `false`.
pub fn flag_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => {
            normalize_flag(Some(s.as_str())) == Some(true) || s.trim().eq_ignore_ascii_case("t")
        }
        _ => false,
    }
}

/// Interpret a stored value as a number. Text keeps only its digits and dots and
/// must then read `digits[.digits]`, the same guard the SQL read of numeric text
/// columns applies: `"20000+"` is 20000, `"1.500.00"` and `"."` are `None`.
pub fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => stored_number(s),
        _ => None,
    }
}

fn stored_number(raw: &str) -> Option<f64> {
    let digits = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>();
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits.as_str(), None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !fraction.map_or(true, all_digits) {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse user input like `"$1,500"`, `"2_000"` or `" 25.5 "`; anything else is `None`.
pub fn parse_loose_number(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | '$' | ' '))
        .collect::<String>();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interpret a JSON value as a timestamp (RFC 3339, naive datetime or date).
pub fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    let Value::String(s) = value else {
        return None;
    };
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Render scalar JSON as text; ids are numeric in some tables and uuids in others.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flag_value(&value))
}

pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_value(&value))
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(timestamp_value(&value))
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_value(&value))
}

/// `"approved"` or any truthy flag encoding counts as approved.
pub fn approval<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::String(s) if s.trim().eq_ignore_ascii_case("approved") => true,
        other => flag_value(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags_accept_every_storage_encoding() {
        for v in [json!(true), json!("true"), json!(1), json!("1"), json!("t"), json!("YES")] {
            assert!(flag_value(&v), "{v}");
        }
        let falsy = [
            json!(false),
            json!("false"),
            json!(0),
            json!(null),
            json!("undefined"),
            json!([]),
        ];
        for v in falsy {
            assert!(!flag_value(&v), "{v}");
        }
    }

    #[test]
    fn numbers_from_text_columns() {
        assert_eq!(number_value(&json!("5000")), Some(5000.0));
        assert_eq!(number_value(&json!("$1,500")), Some(1500.0));
        assert_eq!(number_value(&json!(42)), Some(42.0));
        assert_eq!(number_value(&json!("20000+")), Some(20000.0));
        assert_eq!(number_value(&json!("12.5 USD")), Some(12.5));
        assert_eq!(number_value(&json!("negotiable")), None);
        assert_eq!(number_value(&json!("1.500.00")), None);
        assert_eq!(number_value(&json!(".")), None);
        assert_eq!(number_value(&json!(".5")), None);
        assert_eq!(number_value(&json!("")), None);
    }

    #[test]
    fn timestamps_in_postgres_json_shapes() {
        let a = timestamp_value(&json!("2026-09-01T10:00:00.123+00:00")).unwrap();
        let b = timestamp_value(&json!("2026-09-01T10:00:00")).unwrap();
        let c = timestamp_value(&json!("2026-09-01")).unwrap();
        assert_eq!(a.date_naive(), b.date_naive());
        assert_eq!(b.date_naive(), c.date_naive());
        assert!(timestamp_value(&json!("yesterday")).is_none());
    }
}
