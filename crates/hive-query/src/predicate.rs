//! Structural predicates and their SQL fragments.
//!
//! Builders describe a filter as a [`Predicate`] tree over whitelisted
//! [`Column`]s. Rendering turns the tree into a condition string with local
//! placeholders `$1..$n` and the matching ordered values; the same tree can be
//! evaluated directly against a JSON row by stores that do not speak SQL.

use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hive_core::decode::{flag_value, number_value, text_value, timestamp_value};
use hive_core::SqlValue;
use serde_json::{Map, Value};

/// How a column is stored, which decides the SQL expression used to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Numbers kept in a text column (`budget`, `rate`). Text that does not
    /// reduce to `digits[.digits]` reads as NULL.
    NumericText,
    Timestamp,
    /// Booleans stored as `true`, `'true'`, `1` or `'1'`.
    Flag,
}

/// A column name known at compile time. User input never becomes a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn numeric_text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::NumericText,
        }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Timestamp,
        }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Flag,
        }
    }

    /// SQL expression reading this column as its logical type.
    pub fn sql_expr(&self) -> String {
        let name = self.name;
        match self.kind {
            ColumnKind::Text => self.text_expr(),
            ColumnKind::NumericText => {
                let digits = format!("regexp_replace({name}::text, '[^0-9.]', '', 'g')");
                format!(
                    "(CASE WHEN {digits} ~ '^[0-9]+(\\.[0-9]+)?$' THEN {digits}::numeric END)"
                )
            }
            ColumnKind::Timestamp => name.to_string(),
            ColumnKind::Flag => {
                format!("LOWER(COALESCE({name}::text, '')) IN ('true', 't', '1', 'yes', 'on')")
            }
        }
    }

    /// Lower-cased text form, used for substring and equality matching on any kind.
    pub fn text_expr(&self) -> String {
        format!("LOWER({}::text)", self.name)
    }

    fn read<'a>(&self, row: &'a Map<String, Value>) -> &'a Value {
        row.get(self.name).unwrap_or(&Value::Null)
    }
}

/// Comparison bound for range predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Number(f64),
    Time(DateTime<Utc>),
}

impl Bound {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Bound::Number(n) => SqlValue::Float(n),
            Bound::Time(t) => SqlValue::Timestamp(t),
        }
    }

    fn compare_with(&self, column: &Column, row: &Map<String, Value>) -> Option<Ordering> {
        let value = column.read(row);
        match self {
            Bound::Number(bound) => number_value(value)?.partial_cmp(bound),
            Bound::Time(bound) => Some(timestamp_value(value)?.cmp(bound)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring of at least one column.
    Contains { columns: Vec<Column>, needle: String },
    /// Case-insensitive equality with at least one column.
    Equals { columns: Vec<Column>, value: String },
    AtLeast { column: Column, bound: Bound },
    AtMost { column: Column, bound: Bound },
    Truthy { column: Column },
    Falsy { column: Column },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Render with placeholders continuing from `values.len() + 1`.
    pub fn render(&self, out: &mut String, values: &mut Vec<SqlValue>) {
        match self {
            Predicate::Contains { columns, needle } => {
                let pattern = SqlValue::Text(format!("%{}%", escape_like(&needle.to_lowercase())));
                render_any_column(out, values, columns, &pattern, |out, column, placeholder| {
                    let _ = write!(out, "{} LIKE {placeholder} ESCAPE '\\'", column.text_expr());
                });
            }
            Predicate::Equals { columns, value } => {
                let lowered = SqlValue::Text(value.to_lowercase());
                render_any_column(out, values, columns, &lowered, |out, column, placeholder| {
                    let _ = write!(out, "{} = {placeholder}", column.text_expr());
                });
            }
            Predicate::AtLeast { column, bound } => {
                values.push(bound.to_sql_value());
                let _ = write!(out, "{} >= ${}", column.sql_expr(), values.len());
            }
            Predicate::AtMost { column, bound } => {
                values.push(bound.to_sql_value());
                let _ = write!(out, "{} <= ${}", column.sql_expr(), values.len());
            }
            Predicate::Truthy { column } => {
                let _ = write!(out, "{}", column.sql_expr());
            }
            Predicate::Falsy { column } => {
                let _ = write!(out, "NOT ({})", column.sql_expr());
            }
            Predicate::All(parts) => render_joined(out, values, parts, " AND "),
            Predicate::Any(parts) => render_joined(out, values, parts, " OR "),
        }
    }

    /// Evaluate against a row object the way the rendered SQL would.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            Predicate::Contains { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|c| {
                    text_value(c.read(row))
                        .map(|text| text.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
            Predicate::Equals { columns, value } => {
                let value = value.to_lowercase();
                columns.iter().any(|c| {
                    text_value(c.read(row))
                        .map(|text| text.to_lowercase() == value)
                        .unwrap_or(false)
                })
            }
            Predicate::AtLeast { column, bound } => matches!(
                bound.compare_with(column, row),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::AtMost { column, bound } => matches!(
                bound.compare_with(column, row),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Predicate::Truthy { column } => flag_value(column.read(row)),
            Predicate::Falsy { column } => !flag_value(column.read(row)),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(row)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(row)),
        }
    }
}

fn render_any_column(
    out: &mut String,
    values: &mut Vec<SqlValue>,
    columns: &[Column],
    value: &SqlValue,
    mut write_one: impl FnMut(&mut String, &Column, &str),
) {
    if columns.is_empty() {
        out.push_str("FALSE");
        return;
    }
    out.push('(');
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            out.push_str(" OR ");
        }
        values.push(value.clone());
        let placeholder = format!("${}", values.len());
        write_one(out, column, &placeholder);
    }
    out.push(')');
}

fn render_joined(out: &mut String, values: &mut Vec<SqlValue>, parts: &[Predicate], sep: &str) {
    match parts {
        [] => out.push_str(if sep.trim() == "AND" { "TRUE" } else { "FALSE" }),
        [single] => single.render(out, values),
        _ => {
            out.push('(');
            for (idx, part) in parts.iter().enumerate() {
                if idx > 0 {
                    out.push_str(sep);
                }
                part.render(out, values);
            }
            out.push(')');
        }
    }
}

/// Escape `LIKE` metacharacters so user text is matched literally.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A piece of a WHERE clause with its own `$1..$n` numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateFragment {
    pub condition: String,
    pub values: Vec<SqlValue>,
    predicate: Option<Predicate>,
}

impl PredicateFragment {
    /// The no-op fragment; dropped by the composer.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A hand-written condition. It has no structural form, so only SQL stores can run it.
    pub fn raw(condition: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            condition: condition.into(),
            values,
            predicate: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.condition.trim().is_empty()
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }
}

impl From<Predicate> for PredicateFragment {
    fn from(predicate: Predicate) -> Self {
        let mut condition = String::new();
        let mut values = Vec::new();
        predicate.render(&mut condition, &mut values);
        Self {
            condition,
            values,
            predicate: Some(predicate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TITLE: Column = Column::text("title");
    const DESCRIPTION: Column = Column::text("description");
    const BUDGET: Column = Column::numeric_text("budget");

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn contains_renders_one_placeholder_per_column() {
        let fragment = PredicateFragment::from(Predicate::Contains {
            columns: vec![TITLE, DESCRIPTION],
            needle: "Rust".into(),
        });
        assert_eq!(
            fragment.condition,
            "(LOWER(title::text) LIKE $1 ESCAPE '\\' \
             OR LOWER(description::text) LIKE $2 ESCAPE '\\')"
        );
        assert_eq!(
            fragment.values,
            vec![SqlValue::Text("%rust%".into()), SqlValue::Text("%rust%".into())]
        );
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }

    #[test]
    fn ranges_compare_numeric_text() {
        let p = Predicate::All(vec![
            Predicate::AtLeast {
                column: BUDGET,
                bound: Bound::Number(1000.0),
            },
            Predicate::AtMost {
                column: BUDGET,
                bound: Bound::Number(5000.0),
            },
        ]);
        assert!(p.matches(&row(json!({"budget": "5000"}))));
        assert!(p.matches(&row(json!({"budget": 1000}))));
        assert!(!p.matches(&row(json!({"budget": "5001"}))));
        assert!(!p.matches(&row(json!({"budget": null}))));

        let fragment = PredicateFragment::from(p);
        assert_eq!(fragment.values.len(), 2);
        assert!(fragment.condition.contains(">= $1"));
        assert!(fragment.condition.contains("<= $2"));
    }

    #[test]
    fn malformed_numeric_text_reads_as_null() {
        let digits = "regexp_replace(budget::text, '[^0-9.]', '', 'g')";
        let expected =
            format!("(CASE WHEN {digits} ~ '^[0-9]+(\\.[0-9]+)?$' THEN {digits}::numeric END)");
        assert_eq!(BUDGET.sql_expr(), expected);

        let at_least = Predicate::AtLeast {
            column: BUDGET,
            bound: Bound::Number(1000.0),
        };
        assert!(at_least.matches(&row(json!({"budget": "3000"}))));
        assert!(!at_least.matches(&row(json!({"budget": "1.500.00"}))));
        assert!(!at_least.matches(&row(json!({"budget": "."}))));
    }

    #[test]
    fn flags_render_without_values() {
        let fragment = PredicateFragment::from(Predicate::Truthy {
            column: Column::flag("mentor"),
        });
        assert!(fragment.values.is_empty());
        assert!(!fragment.condition.contains('$'));
        assert!(fragment.predicate().unwrap().matches(&row(json!({"mentor": "1"}))));
    }
}
