//! Predicate builders, one filter concern each.
//!
//! Every builder is total: blank, `"any"`, `"all"` or unparseable input yields
//! [`PredicateFragment::empty`], which the composer drops.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use hive_core::decode::parse_loose_number;
use hive_core::normalize_flag;
use tracing::{debug, warn};

use crate::predicate::{Bound, Column, Predicate, PredicateFragment};

const MAX_SEARCH_CHARS: usize = 200;
const MAX_SEARCH_TERMS: usize = 10;
const MAX_RELATIVE_DAYS: i64 = 365;

/// Country codes and the names they stand for. Codes match exactly, names by substring.
const LOCATION_ALIASES: &[(&[&str], &[&str])] = &[
    (&["us", "usa"], &["united states", "united states of america"]),
    (&["uk", "gb"], &["united kingdom", "great britain", "england"]),
    (&["de"], &["germany", "deutschland"]),
    (&["fr"], &["france"]),
    (&["es"], &["spain", "españa"]),
    (&["it"], &["italy"]),
    (&["nl"], &["netherlands", "holland"]),
    (&["ch"], &["switzerland"]),
    (&["pt"], &["portugal"]),
    (&["pl"], &["poland"]),
    (&["ca"], &["canada"]),
    (&["br"], &["brazil"]),
    (&["in"], &["india"]),
    (&["sg"], &["singapore"]),
    (&["ae", "uae"], &["united arab emirates"]),
    (&["au"], &["australia"]),
    (&["jp"], &["japan"]),
];

/// Trim, drop control characters, collapse whitespace, cap the length.
pub fn sanitize_search_input(raw: &str) -> String {
    let cleaned = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(MAX_SEARCH_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Sanitized value, or `None` when the input means "no filter".
fn meaningful(raw: Option<&str>) -> Option<String> {
    let value = sanitize_search_input(raw?);
    match value.to_ascii_lowercase().as_str() {
        "" | "any" | "all" | "undefined" | "null" => None,
        _ => Some(value),
    }
}

/// Every whitespace-separated word must occur in at least one of `columns`.
pub fn build_text_search_filter(raw: Option<&str>, columns: &[Column]) -> PredicateFragment {
    let Some(value) = meaningful(raw) else {
        return PredicateFragment::empty();
    };
    if columns.is_empty() {
        return PredicateFragment::empty();
    }

    let mut words: Vec<String> = Vec::new();
    for word in value.to_lowercase().split_whitespace() {
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    if words.len() > MAX_SEARCH_TERMS {
        debug!(terms = words.len(), "search truncated to {MAX_SEARCH_TERMS} terms");
        words.truncate(MAX_SEARCH_TERMS);
    }

    let parts = words
        .into_iter()
        .map(|needle| Predicate::Contains {
            columns: columns.to_vec(),
            needle,
        })
        .collect();
    Predicate::All(parts).into()
}

/// Expand one location term into its aliases, if it names a known country.
pub fn expand_location_term(term: &str) -> (Vec<String>, Vec<String>) {
    let term = term.trim().to_lowercase();
    for (codes, names) in LOCATION_ALIASES {
        if codes.contains(&term.as_str()) || names.contains(&term.as_str()) {
            return (
                codes.iter().map(ToString::to_string).collect(),
                names.iter().map(ToString::to_string).collect(),
            );
        }
    }
    (Vec::new(), vec![term])
}

/// Any expanded term may match either the city or the country column.
pub fn build_location_filter(
    raw: Option<&str>,
    city: Column,
    country: Column,
) -> PredicateFragment {
    let Some(value) = meaningful(raw) else {
        return PredicateFragment::empty();
    };

    let mut alternatives = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (codes, names) = expand_location_term(part);
        for code in codes {
            if !seen.contains(&code) {
                seen.push(code.clone());
                alternatives.push(Predicate::Equals {
                    columns: vec![city, country],
                    value: code,
                });
            }
        }
        for name in names {
            if !seen.contains(&name) {
                seen.push(name.clone());
                alternatives.push(Predicate::Contains {
                    columns: vec![city, country],
                    needle: name,
                });
            }
        }
    }

    if alternatives.is_empty() {
        return PredicateFragment::empty();
    }
    Predicate::Any(alternatives).into()
}

pub fn build_date_filter(raw: Option<&str>, column: Column) -> PredicateFragment {
    build_date_filter_at(raw, column, Utc::now())
}

/// Relative window (`7d`) or explicit `start,end` range, evaluated against `now`.
pub fn build_date_filter_at(
    raw: Option<&str>,
    column: Column,
    now: DateTime<Utc>,
) -> PredicateFragment {
    let Some(value) = meaningful(raw) else {
        return PredicateFragment::empty();
    };
    let token = value.to_ascii_lowercase();

    if let Some(days) = relative_days(&token) {
        return Predicate::AtLeast {
            column,
            bound: Bound::Time(now - Duration::days(days)),
        }
        .into();
    }

    let (start_raw, end_raw) = token.split_once(',').unwrap_or((token.as_str(), ""));
    let start = match parse_day(start_raw) {
        Ok(start) => start,
        Err(()) => {
            warn!(input = %value, "dropping date filter: unparseable start");
            return PredicateFragment::empty();
        }
    };
    let end = match parse_day(end_raw) {
        Ok(end) => end,
        Err(()) => {
            warn!(input = %value, "dropping date filter: unparseable end");
            return PredicateFragment::empty();
        }
    };

    let mut parts = Vec::new();
    if let Some(start) = start {
        parts.push(Predicate::AtLeast {
            column,
            bound: Bound::Time(start.and_time(NaiveTime::MIN).and_utc()),
        });
    }
    if let Some(end) = end {
        parts.push(Predicate::AtMost {
            column,
            bound: Bound::Time(end_of_day(end)),
        });
    }
    if parts.is_empty() {
        return PredicateFragment::empty();
    }
    Predicate::All(parts).into()
}

fn relative_days(token: &str) -> Option<i64> {
    match token {
        "24h" | "last24hours" | "today" => return Some(1),
        "week" | "lastweek" => return Some(7),
        "month" | "lastmonth" => return Some(30),
        _ => {}
    }
    let days = token.strip_suffix('d')?.parse::<i64>().ok()?;
    (1..=MAX_RELATIVE_DAYS).contains(&days).then_some(days)
}

/// `Ok(None)` for an empty side of a range, `Err` for garbage.
fn parse_day(raw: &str) -> Result<Option<NaiveDate>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(&raw.to_uppercase())
        .map(|ts| Some(ts.with_timezone(&Utc).date_naive()))
        .map_err(|_| ())
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last_milli).and_utc()
}

/// `"min-max"` (inclusive) or `"min+"`; anything non-numeric drops the filter.
pub fn build_budget_filter(raw: Option<&str>, column: Column) -> PredicateFragment {
    let Some(value) = meaningful(raw) else {
        return PredicateFragment::empty();
    };

    let bounds = if let Some(min) = value.strip_suffix('+') {
        parse_loose_number(min).map(|min| (min, None))
    } else if let Some((min, max)) = value.split_once('-') {
        match (parse_loose_number(min), parse_loose_number(max)) {
            (Some(min), Some(max)) if min <= max => Some((min, Some(max))),
            (Some(min), Some(max)) => Some((max, Some(min))),
            _ => None,
        }
    } else {
        None
    };

    let Some((min, max)) = bounds else {
        debug!(input = %value, "dropping budget filter: expected min-max or min+");
        return PredicateFragment::empty();
    };
    range_fragment(column, Some(min), max)
}

/// Independent lower/upper bounds (`minRate`, `maxRate`); an unparseable side is ignored.
pub fn build_numeric_bounds(
    min_raw: Option<&str>,
    max_raw: Option<&str>,
    column: Column,
) -> PredicateFragment {
    let min = meaningful(min_raw).and_then(|v| parse_loose_number(&v));
    let max = meaningful(max_raw).and_then(|v| parse_loose_number(&v));
    range_fragment(column, min, max)
}

fn range_fragment(column: Column, min: Option<f64>, max: Option<f64>) -> PredicateFragment {
    let mut parts = Vec::new();
    if let Some(min) = min {
        parts.push(Predicate::AtLeast {
            column,
            bound: Bound::Number(min),
        });
    }
    if let Some(max) = max {
        parts.push(Predicate::AtMost {
            column,
            bound: Bound::Number(max),
        });
    }
    if parts.is_empty() {
        return PredicateFragment::empty();
    }
    Predicate::All(parts).into()
}

/// Only an explicit truthy value restricts rows; `false` behaves like unset.
pub fn build_flag_filter(raw: Option<&str>, column: Column) -> PredicateFragment {
    match normalize_flag(raw) {
        Some(true) => Predicate::Truthy { column }.into(),
        _ => PredicateFragment::empty(),
    }
}

/// Case-insensitive exact match on one column.
pub fn build_equals_filter(raw: Option<&str>, column: Column) -> PredicateFragment {
    match meaningful(raw) {
        Some(value) => Predicate::Equals {
            columns: vec![column],
            value,
        }
        .into(),
        None => PredicateFragment::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hive_core::SqlValue;
    use serde_json::{json, Map, Value};

    const TITLE: Column = Column::text("title");
    const DESCRIPTION: Column = Column::text("description");
    const CITY: Column = Column::text("city");
    const COUNTRY: Column = Column::text("country");
    const BUDGET: Column = Column::numeric_text("budget");
    const CREATED_AT: Column = Column::timestamp("created_at");

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).single().unwrap()
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn accepts(fragment: &PredicateFragment, value: Value) -> bool {
        fragment.predicate().expect("structural fragment").matches(&row(value))
    }

    #[test]
    fn every_builder_is_a_noop_on_blank_input() {
        for raw in [None, Some(""), Some("   "), Some("any"), Some("ALL")] {
            assert!(build_text_search_filter(raw, &[TITLE]).is_empty());
            assert!(build_location_filter(raw, CITY, COUNTRY).is_empty());
            assert!(build_date_filter_at(raw, CREATED_AT, now()).is_empty());
            assert!(build_budget_filter(raw, BUDGET).is_empty());
            assert!(build_numeric_bounds(raw, raw, BUDGET).is_empty());
            assert!(build_flag_filter(raw, Column::flag("talent")).is_empty());
            assert!(build_equals_filter(raw, TITLE).is_empty());
            let fragment = build_text_search_filter(raw, &[TITLE]);
            assert!(fragment.values.is_empty());
        }
    }

    #[test]
    fn sanitize_collapses_and_caps() {
        assert_eq!(sanitize_search_input("  senior\t\nrust   dev \u{0}"), "senior rust dev");
        assert_eq!(sanitize_search_input(&"a".repeat(500)).len(), 200);
    }

    #[test]
    fn multi_word_search_requires_every_word_in_any_column() {
        let fragment = build_text_search_filter(Some("rust backend"), &[TITLE, DESCRIPTION]);
        assert_eq!(fragment.values.len(), 4);
        assert!(fragment.condition.contains(" AND "));

        assert!(accepts(
            &fragment,
            json!({"title": "Rust engineer", "description": "Backend services"})
        ));
        assert!(!accepts(
            &fragment,
            json!({"title": "Rust engineer", "description": "Frontend work"})
        ));
        assert!(accepts(
            &fragment,
            json!({"title": "BACKEND developer (RUST)", "description": null})
        ));
    }

    #[test]
    fn location_terms_are_alternatives() {
        let fragment = build_location_filter(Some("usa"), CITY, COUNTRY);
        assert!(accepts(&fragment, json!({"city": "Austin", "country": "USA"})));
        assert!(accepts(&fragment, json!({"city": "Austin", "country": "United States"})));
        assert!(!accepts(&fragment, json!({"city": "Toronto", "country": "Canada"})));

        let de = build_location_filter(Some("DE"), CITY, COUNTRY);
        assert!(accepts(&de, json!({"city": "Berlin", "country": "Germany"})));
        assert!(!accepts(&de, json!({"city": "Stockholm", "country": "Sweden"})));
    }

    #[test]
    fn location_accepts_several_comma_separated_parts() {
        let fragment = build_location_filter(Some("Lisbon, fr"), CITY, COUNTRY);
        assert!(accepts(&fragment, json!({"city": "Lisbon", "country": "Portugal"})));
        assert!(accepts(&fragment, json!({"city": "Lyon", "country": "France"})));
        assert!(!accepts(&fragment, json!({"city": "Madrid", "country": "Spain"})));
    }

    #[test]
    fn relative_dates_subtract_days_from_now() {
        let fragment = build_date_filter_at(Some("7d"), CREATED_AT, now());
        assert_eq!(
            fragment.values,
            vec![SqlValue::Timestamp(now() - Duration::days(7))]
        );
        assert!(fragment.condition.starts_with("created_at >= $1"));
        assert!(accepts(&fragment, json!({"created_at": "2026-10-12T00:00:00Z"})));
        assert!(!accepts(&fragment, json!({"created_at": "2026-10-01T00:00:00Z"})));
    }

    #[test]
    fn explicit_range_clamps_end_of_day() {
        let fragment = build_date_filter_at(Some("2026-09-01,2026-09-30"), CREATED_AT, now());
        let end = Utc
            .with_ymd_and_hms(2026, 9, 30, 23, 59, 59)
            .single()
            .unwrap()
            + Duration::milliseconds(999);
        assert_eq!(fragment.values.len(), 2);
        assert_eq!(fragment.values[1], SqlValue::Timestamp(end));
        assert!(accepts(&fragment, json!({"created_at": "2026-09-30T22:00:00Z"})));
        assert!(!accepts(&fragment, json!({"created_at": "2026-10-01T00:00:00Z"})));
    }

    #[test]
    fn invalid_dates_drop_the_filter() {
        assert!(build_date_filter_at(Some("2026-13-45,2026-09-30"), CREATED_AT, now()).is_empty());
        assert!(build_date_filter_at(Some("soon"), CREATED_AT, now()).is_empty());
        assert!(build_date_filter_at(Some("0d"), CREATED_AT, now()).is_empty());
    }

    #[test]
    fn budget_range_parsing() {
        let closed = build_budget_filter(Some("1000-5000"), BUDGET);
        assert_eq!(closed.values, vec![SqlValue::Float(1000.0), SqlValue::Float(5000.0)]);
        assert!(accepts(&closed, json!({"budget": "1000"})));
        assert!(accepts(&closed, json!({"budget": "5000"})));
        assert!(!accepts(&closed, json!({"budget": "5001"})));

        let open = build_budget_filter(Some("25000+"), BUDGET);
        assert_eq!(open.values, vec![SqlValue::Float(25000.0)]);
        assert!(accepts(&open, json!({"budget": "90000"})));

        assert!(build_budget_filter(Some("abc-5000"), BUDGET).is_empty());
        assert!(build_budget_filter(Some("5000"), BUDGET).is_empty());
        assert_eq!(
            build_budget_filter(Some("5,000-1,000"), BUDGET).values,
            vec![SqlValue::Float(1000.0), SqlValue::Float(5000.0)]
        );
    }

    #[test]
    fn numeric_bounds_keep_the_parseable_side() {
        let fragment = build_numeric_bounds(Some("40"), Some("lots"), BUDGET);
        assert_eq!(fragment.values, vec![SqlValue::Float(40.0)]);
    }

    #[test]
    fn only_explicit_true_flags_filter() {
        let talent = Column::flag("talent");
        assert!(!build_flag_filter(Some("yes"), talent).is_empty());
        for raw in ["false", "0", "off", "undefined", "null", ""] {
            assert!(build_flag_filter(Some(raw), talent).is_empty(), "{raw}");
        }
    }
}
