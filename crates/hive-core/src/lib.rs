//! Core request/response model for the GoodHive listing engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod config;
pub mod decode;
mod rows;

pub use config::HiveConfig;
pub use rows::{split_skills, JobRow, JobView, TalentRow, TalentView};

pub const CRATE_NAME: &str = "hive-core";

/// Raw listing filters as they arrive on the query string.
///
/// Every field is kept as an unparsed string: builders decide what a value
/// means, and anything they cannot interpret is treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(alias = "dateRange", skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(alias = "budget", skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rate: Option<String>,
    #[serde(alias = "talent", skip_serializing_if = "Option::is_none")]
    pub only_talent: Option<String>,
    #[serde(alias = "mentor", skip_serializing_if = "Option::is_none")]
    pub only_mentor: Option<String>,
    #[serde(alias = "recruiter", skip_serializing_if = "Option::is_none")]
    pub only_recruiter: Option<String>,
    #[serde(alias = "remote", skip_serializing_if = "Option::is_none")]
    pub remote_only: Option<String>,
    #[serde(alias = "freelance", skip_serializing_if = "Option::is_none")]
    pub freelance_only: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl FilterRequest {
    /// Parse an urlencoded query string (`search=rust&page=2`).
    pub fn from_query_str(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(query.trim_start_matches('?'))
    }

    pub fn pagination(&self, defaults: PageDefaults) -> Pagination {
        Pagination::from_raw(self.page.as_deref(), self.items.as_deref(), defaults)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub items: u32,
    pub max_items: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            items: 10,
            max_items: 100,
        }
    }
}

/// 1-based page plus page size. Both are always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub items: u32,
}

impl Pagination {
    pub fn new(page: u32, items: u32) -> Self {
        Self {
            page: page.max(1),
            items: items.max(1),
        }
    }

    pub fn from_raw(page: Option<&str>, items: Option<&str>, defaults: PageDefaults) -> Self {
        let max_items = defaults.max_items.max(1);
        let items = parse_positive(items)
            .unwrap_or(defaults.items)
            .clamp(1, max_items);
        let page = parse_positive(page).unwrap_or(1);
        Self { page, items }
    }

    pub fn limit(&self) -> u32 {
        self.items
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.items) * u64::from(self.page.saturating_sub(1))
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    let value = raw?.trim().parse::<i64>().ok()?;
    if value < 1 {
        return None;
    }
    Some(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Tri-state normalization for flag-like strings.
///
/// `true/1/yes/on` and `false/0/no/off` (any case) map to a boolean;
/// everything else, including `"undefined"` and `"null"`, means "not set".
pub fn normalize_flag(raw: Option<&str>) -> Option<bool> {
    let value = raw?.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Positional parameter bound into a composed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    Anonymous,
    Unverified,
    Approved,
}

/// Request-scoped authorization level of whoever is looking at a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerAccess {
    pub tier: AccessTier,
    pub is_approved: bool,
}

impl ViewerAccess {
    pub fn new(tier: AccessTier) -> Self {
        Self {
            tier,
            is_approved: tier == AccessTier::Approved,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(AccessTier::Anonymous)
    }

    pub fn unverified() -> Self {
        Self::new(AccessTier::Unverified)
    }

    pub fn approved() -> Self {
        Self::new(AccessTier::Approved)
    }
}

impl Default for ViewerAccess {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Approval state of a viewer as stored on their user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerStatus {
    #[serde(deserialize_with = "decode::approval")]
    pub talent_status: bool,
    #[serde(deserialize_with = "decode::approval")]
    pub mentor_status: bool,
    #[serde(deserialize_with = "decode::approval")]
    pub recruiter_status: bool,
}

impl ViewerStatus {
    pub fn has_approved_role(&self) -> bool {
        self.talent_status || self.mentor_status || self.recruiter_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_arithmetic() {
        let p = Pagination::from_raw(Some("3"), Some("10"), PageDefaults::default());
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn pagination_falls_back_on_garbage() {
        let defaults = PageDefaults {
            items: 9,
            max_items: 50,
        };
        let p = Pagination::from_raw(Some("zero"), Some("-4"), defaults);
        assert_eq!(p, Pagination { page: 1, items: 9 });

        let p = Pagination::from_raw(Some("0"), Some("5000"), defaults);
        assert_eq!(p, Pagination { page: 1, items: 50 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn tri_state_flags() {
        for raw in ["true", "1", "yes", "on", "TRUE", " Yes "] {
            assert_eq!(normalize_flag(Some(raw)), Some(true), "{raw}");
        }
        for raw in ["false", "0", "no", "off", "Off"] {
            assert_eq!(normalize_flag(Some(raw)), Some(false), "{raw}");
        }
        for raw in ["", "undefined", "null", "maybe"] {
            assert_eq!(normalize_flag(Some(raw)), None, "{raw}");
        }
        assert_eq!(normalize_flag(None), None);
    }

    #[test]
    fn filter_request_reads_camel_case_and_aliases() {
        let filters = FilterRequest::from_query_str(
            "?search=rust%20backend&budgetRange=1000-5000&recruiter=true&dateRange=7d&unknown=1",
        )
        .unwrap();
        assert_eq!(filters.search.as_deref(), Some("rust backend"));
        assert_eq!(filters.budget_range.as_deref(), Some("1000-5000"));
        assert_eq!(filters.only_recruiter.as_deref(), Some("true"));
        assert_eq!(filters.date_posted.as_deref(), Some("7d"));
        assert!(filters.location.is_none());
    }

    #[test]
    fn bound_values_serialize_tagged() {
        let values: Vec<SqlValue> = vec!["%rust%".into(), 5000.0.into()];
        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            serde_json::json!([
                {"type": "text", "value": "%rust%"},
                {"type": "float", "value": 5000.0}
            ])
        );
    }

    #[test]
    fn viewer_status_reads_mixed_encodings() {
        let status: ViewerStatus = serde_json::from_value(serde_json::json!({
            "talent_status": "approved",
            "mentor_status": "pending",
            "recruiter_status": null
        }))
        .unwrap();
        assert!(status.talent_status);
        assert!(!status.mentor_status);
        assert!(status.has_approved_role());

        let status: ViewerStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!status.has_approved_role());
    }
}
