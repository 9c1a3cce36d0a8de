use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_DATE_POSTED: &str = "7";

/// Job search query as the UI submits it. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Maximum listing age in days, as a string (`"1"`, `"7"`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
}

impl JobSearchParams {
    pub fn new(title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            location: Some(location.into()),
            ..Self::default()
        }
    }

    /// Canonical form: free text lower-cased and trimmed, missing or empty
    /// fields replaced by their defaults.
    pub fn normalize(&self) -> NormalizedSearchParams {
        NormalizedSearchParams {
            country: non_empty(self.country.as_deref())
                .unwrap_or(DEFAULT_COUNTRY)
                .to_string(),
            title: canonical_text(self.title.as_deref()),
            location: canonical_text(self.location.as_deref()),
            limit: self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT),
            date_posted: non_empty(self.date_posted.as_deref())
                .unwrap_or(DEFAULT_DATE_POSTED)
                .to_string(),
        }
    }

    pub fn cache_key(&self) -> String {
        self.normalize().cache_key()
    }
}

/// Query after canonicalization. Two queries that differ only in case,
/// surrounding whitespace or omitted defaults normalize to equal values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedSearchParams {
    pub country: String,
    pub title: String,
    pub location: String,
    pub limit: u32,
    pub date_posted: String,
}

impl NormalizedSearchParams {
    /// Stable string key. Object keys serialise in sorted order.
    pub fn cache_key(&self) -> String {
        json!({
            "country": self.country,
            "title": self.title,
            "location": self.location,
            "limit": self.limit,
            "datePosted": self.date_posted,
        })
        .to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn canonical_text(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employer {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State / region code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub text: String,
}

/// One listing returned by the job search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<Employer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<JobLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_salary: Option<SalaryRange>,
    /// Provider attribute code → label, e.g. employment type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub job_types: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<JobDescription>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_published: Option<DateTime<Utc>>,
}

impl JobListing {
    pub fn employer_name(&self) -> Option<&str> {
        self.employer.as_ref().map(|e| e.name.as_str())
    }
}

// Providers send RFC 3339 timestamps or bare dates; anything else is dropped.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(midnight.and_utc()));
    }

    tracing::debug!("Unrecognized datePublished '{raw}', ignoring");
    Ok(None)
}
