//! Tier-based redaction of listing rows.
//!
//! Approved viewers see contact details and full names. Everyone else gets
//! initials, no contact fields, and free text with the owner's name masked.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hive_core::{split_skills, JobRow, JobView, TalentRow, TalentView, ViewerAccess};
use regex::Regex;

pub const NAME_PLACEHOLDER: &str = "[name hidden]";

/// Shortest value considered for legacy base64 decoding.
const MIN_ENCODED_LEN: usize = 8;

/// Older records stored rich text base64-encoded. Decode only when the value is
/// well-formed base64 *and* decodes to printable UTF-8; otherwise keep it as is.
pub fn decode_legacy_text(raw: &str) -> Cow<'_, str> {
    let trimmed = raw.trim();
    let looks_encoded = trimmed.len() >= MIN_ENCODED_LEN
        && trimmed.len() % 4 == 0
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    if !looks_encoded {
        return Cow::Borrowed(raw);
    }

    let Ok(bytes) = STANDARD.decode(trimmed) else {
        return Cow::Borrowed(raw);
    };
    match String::from_utf8(bytes) {
        Ok(text)
            if !text.is_empty() && text.chars().all(|c| !c.is_control() || c.is_whitespace()) =>
        {
            Cow::Owned(text)
        }
        _ => Cow::Borrowed(raw),
    }
}

/// Replace every case-insensitive occurrence of the owner's names, including
/// inside longer tokens such as handles and URLs.
pub fn mask_name_in_text(text: &str, first_name: Option<&str>, last_name: Option<&str>) -> String {
    let mut names = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    if names.is_empty() {
        return text.to_string();
    }
    // Longest first, so "Annabel" wins over "Ann".
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));

    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!("(?i){alternation}")) {
        Ok(pattern) => pattern.replace_all(text, NAME_PLACEHOLDER).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Full name for approved viewers, initials (`"J. D."`) for everyone else.
pub fn format_name_for_tier(
    first_name: Option<&str>,
    last_name: Option<&str>,
    access: &ViewerAccess,
) -> String {
    let parts = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    if access.is_approved {
        return parts.collect::<Vec<_>>().join(" ");
    }
    parts
        .filter_map(|p| p.chars().next())
        .map(|c| format!("{}.", c.to_uppercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn reveal(value: Option<String>, access: &ViewerAccess) -> Option<String> {
    if access.is_approved {
        value.filter(|v| !v.trim().is_empty())
    } else {
        None
    }
}

fn free_text(value: Option<&str>, row: &TalentRow, access: &ViewerAccess) -> Option<String> {
    let decoded = decode_legacy_text(value?);
    if access.is_approved {
        Some(decoded.into_owned())
    } else {
        Some(mask_name_in_text(
            &decoded,
            row.first_name.as_deref(),
            row.last_name.as_deref(),
        ))
    }
}

pub fn talent_view(row: TalentRow, access: &ViewerAccess) -> TalentView {
    let name = format_name_for_tier(row.first_name.as_deref(), row.last_name.as_deref(), access);
    let description = free_text(row.description.as_deref(), &row, access);
    let about_work = free_text(row.about_work.as_deref(), &row, access);
    let skills = split_skills(row.skills.as_deref());

    TalentView {
        user_id: row.user_id,
        name,
        title: row.title,
        description,
        about_work,
        skills,
        city: row.city,
        country: row.country,
        rate: row.rate,
        currency: row.currency,
        image_url: row.image_url,
        talent: row.talent,
        mentor: row.mentor,
        recruiter: row.recruiter,
        remote_only: row.remote_only,
        freelance_only: row.freelance_only,
        created_at: row.created_at,
        first_name: reveal(row.first_name, access),
        last_name: reveal(row.last_name, access),
        email: reveal(row.email, access),
        wallet_address: reveal(row.wallet_address, access),
        phone_country_code: reveal(row.phone_country_code, access),
        phone_number: reveal(row.phone_number, access),
        telegram: reveal(row.telegram, access),
        linkedin: reveal(row.linkedin, access),
        github: reveal(row.github, access),
        portfolio: reveal(row.portfolio, access),
    }
}

pub fn job_view(row: JobRow, access: &ViewerAccess) -> JobView {
    let description = row
        .description
        .as_deref()
        .map(|d| decode_legacy_text(d).into_owned());
    let skills = split_skills(row.skills.as_deref());

    JobView {
        id: row.id,
        title: row.title,
        description,
        skills,
        city: row.city,
        country: row.country,
        budget: row.budget,
        currency: row.currency,
        project_type: row.project_type,
        type_engagement: row.type_engagement,
        job_type: row.job_type,
        duration: row.duration,
        company_name: row.company_name,
        image_url: row.image_url,
        talent: row.talent,
        mentor: row.mentor,
        recruiter: row.recruiter,
        posted_at: row.created_at,
        user_id: reveal(row.user_id, access),
        company_email: reveal(row.company_email, access),
        wallet_address: reveal(row.wallet_address, access),
        telegram: reveal(row.telegram, access),
    }
}
