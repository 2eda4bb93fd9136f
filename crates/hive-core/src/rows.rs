use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode;

/// Job posting as read from storage (one JSON object per row).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobRow {
    #[serde(deserialize_with = "decode::text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "decode::text")]
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Comma-joined skill names.
    pub skills: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(deserialize_with = "decode::number")]
    pub budget: Option<f64>,
    pub currency: Option<String>,
    pub project_type: Option<String>,
    pub type_engagement: Option<String>,
    pub job_type: Option<String>,
    pub duration: Option<String>,
    pub company_name: Option<String>,
    pub company_email: Option<String>,
    pub wallet_address: Option<String>,
    pub telegram: Option<String>,
    pub image_url: Option<String>,
    #[serde(deserialize_with = "decode::flag")]
    pub talent: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub mentor: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub recruiter: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub published: bool,
    #[serde(deserialize_with = "decode::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Talent profile as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TalentRow {
    #[serde(deserialize_with = "decode::text")]
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub about_work: Option<String>,
    pub skills: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(deserialize_with = "decode::number")]
    pub rate: Option<f64>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub wallet_address: Option<String>,
    pub phone_country_code: Option<String>,
    pub phone_number: Option<String>,
    pub telegram: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub image_url: Option<String>,
    #[serde(deserialize_with = "decode::flag")]
    pub talent: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub mentor: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub recruiter: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub remote_only: bool,
    #[serde(deserialize_with = "decode::flag")]
    pub freelance_only: bool,
    #[serde(deserialize_with = "decode::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Vec<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub budget: Option<f64>,
    pub currency: Option<String>,
    pub project_type: Option<String>,
    pub type_engagement: Option<String>,
    pub job_type: Option<String>,
    pub duration: Option<String>,
    pub company_name: Option<String>,
    pub image_url: Option<String>,
    pub talent: bool,
    pub mentor: bool,
    pub recruiter: bool,
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentView {
    pub user_id: Option<String>,
    /// Display name, full or initials depending on the viewer.
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub about_work: Option<String>,
    pub skills: Vec<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub rate: Option<f64>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub talent: bool,
    pub mentor: bool,
    pub recruiter: bool,
    pub remote_only: bool,
    pub freelance_only: bool,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
}

/// Split a comma-joined skills column into trimmed, non-empty names.
pub fn split_skills(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
