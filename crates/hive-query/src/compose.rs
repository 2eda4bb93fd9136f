//! Turns predicate fragments into COUNT and paginated SELECT statements.

use std::cmp::Ordering;

use hive_core::decode::{number_value, text_value, timestamp_value};
use hive_core::{Pagination, SqlValue};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::predicate::{Column, ColumnKind, Predicate, PredicateFragment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: Column,
    pub descending: bool,
}

impl SortKey {
    pub const fn asc(column: Column) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub const fn desc(column: Column) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    fn sql(&self) -> String {
        let expr = match self.column.kind {
            ColumnKind::Flag => self.column.text_expr(),
            _ => self.column.sql_expr(),
        };
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{expr} {direction} NULLS LAST")
    }

    fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        let left = a.get(self.column.name).unwrap_or(&Value::Null);
        let right = b.get(self.column.name).unwrap_or(&Value::Null);
        match self.column.kind {
            ColumnKind::Timestamp => cmp_nulls_last(
                timestamp_value(left),
                timestamp_value(right),
                self.descending,
            ),
            ColumnKind::NumericText => {
                cmp_nulls_last(number_value(left), number_value(right), self.descending)
            }
            ColumnKind::Text | ColumnKind::Flag => cmp_nulls_last(
                text_value(left).map(|s| s.to_lowercase()),
                text_value(right).map(|s| s.to_lowercase()),
                self.descending,
            ),
        }
    }
}

fn cmp_nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One entry of a listing's ORDER BY whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub token: &'static str,
    pub keys: &'static [SortKey],
}

impl SortSpec {
    pub const LATEST: SortSpec = SortSpec {
        token: "latest",
        keys: &[SortKey::desc(Column::timestamp("created_at"))],
    };

    pub fn order_clause(&self) -> String {
        self.keys.iter().map(SortKey::sql).collect::<Vec<_>>().join(", ")
    }

    /// Order JSON rows the way `order_clause` orders them in SQL.
    pub fn compare_rows(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        self.keys
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

/// Pick a whitelisted sort by token; unknown tokens get the first (default) entry.
pub fn resolve_sort(whitelist: &[SortSpec], token: Option<&str>) -> SortSpec {
    let default = whitelist.first().copied().unwrap_or(SortSpec::LATEST);
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return default;
    };
    match whitelist.iter().find(|s| s.token.eq_ignore_ascii_case(token)) {
        Some(spec) => *spec,
        None => {
            debug!(token, fallback = default.token, "unknown sort token");
            default
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("fragment {fragment} references ${placeholder} but carries {values} values")]
    PlaceholderOutOfRange {
        fragment: usize,
        placeholder: usize,
        values: usize,
    },
    #[error("fragment {fragment} never references its value #{index}")]
    UnreferencedValue { fragment: usize, index: usize },
}

/// A complete, parameterized listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    /// Conditions joined with AND, without the `WHERE` keyword; empty when unfiltered.
    pub where_clause: String,
    /// Without the `ORDER BY` keyword.
    pub order_clause: String,
    pub limit: u32,
    pub offset: u64,
    /// `values[k - 1]` binds `$k`.
    pub values: Vec<SqlValue>,
    pub sort: SortSpec,
    structure: Vec<Option<Predicate>>,
}

impl ComposedQuery {
    fn where_sql(&self) -> String {
        if self.where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }

    pub fn count_statement(&self, table: &str) -> String {
        format!("SELECT COUNT(*) AS count FROM {table}{}", self.where_sql())
    }

    /// Rows come back as one JSON object each, in column `row`.
    pub fn select_statement(&self, table: &str) -> String {
        format!(
            "SELECT to_jsonb(t) AS row FROM {table} t{} ORDER BY {} LIMIT {} OFFSET {}",
            self.where_sql(),
            self.order_clause,
            self.limit,
            self.offset
        )
    }

    /// The predicate trees behind the WHERE clause, or `None` if any fragment was raw SQL.
    pub fn structural_predicates(&self) -> Option<Vec<&Predicate>> {
        self.structure.iter().map(Option::as_ref).collect()
    }
}

/// AND the non-empty fragments together, renumbering placeholders in one pass.
pub fn compose(
    fragments: Vec<PredicateFragment>,
    sort: SortSpec,
    pagination: Pagination,
) -> Result<ComposedQuery, ComposeError> {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    let mut structure = Vec::new();

    for (idx, fragment) in fragments.into_iter().filter(|f| !f.is_empty()).enumerate() {
        let renumbered = renumber(&fragment.condition, values.len(), fragment.values.len(), idx)?;
        conditions.push(renumbered);
        structure.push(fragment.predicate().cloned());
        values.extend(fragment.values);
    }

    let where_clause = match conditions.len() {
        0 => String::new(),
        1 => conditions.remove(0),
        _ => conditions
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" AND "),
    };

    Ok(ComposedQuery {
        where_clause,
        order_clause: sort.order_clause(),
        limit: pagination.limit(),
        offset: pagination.offset(),
        values,
        sort,
        structure,
    })
}

/// Shift every `$n` in `condition` by `base`, skipping quoted literals.
fn renumber(
    condition: &str,
    base: usize,
    local_values: usize,
    fragment: usize,
) -> Result<String, ComposeError> {
    let mut out = String::with_capacity(condition.len() + 8);
    let mut referenced = vec![false; local_values];
    let mut in_literal = false;
    let mut chars = condition.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            out.push('$');
            continue;
        }

        let placeholder = digits.parse::<usize>().unwrap_or(usize::MAX);
        if placeholder == 0 || placeholder > local_values {
            return Err(ComposeError::PlaceholderOutOfRange {
                fragment,
                placeholder,
                values: local_values,
            });
        }
        referenced[placeholder - 1] = true;
        out.push('$');
        out.push_str(&(base + placeholder).to_string());
    }

    if let Some(index) = referenced.iter().position(|r| !r) {
        return Err(ComposeError::UnreferencedValue {
            fragment,
            index: index + 1,
        });
    }
    Ok(out)
}
