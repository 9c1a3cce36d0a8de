use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Interviewing,
    Offer,
    Rejected,
}

/// A job the user is tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub posted_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub job_type: String,
    #[serde(default)]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: ApplicationStatus,
}

/// Profile form data is an open object owned by the UI; this layer only
/// stores and forwards it.
pub type ProfileData = Map<String, Value>;

/// What the per-user cache keeps under the `profile` data type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedProfile {
    pub form_data: ProfileData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

/// User row as returned by the user data endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "profile_object_or_string")]
    pub profile_data: ProfileData,
    /// JSON-encoded `Vec<Application>`.
    #[serde(default)]
    pub applications_txt: Option<String>,
    #[serde(default)]
    pub resume_file_url: Option<String>,
}

impl UserRecord {
    /// Decodes `applications_txt`. Missing or blank text means no
    /// applications yet.
    pub fn applications(&self) -> Result<Vec<Application>, serde_json::Error> {
        match self.applications_txt.as_deref().map(str::trim) {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw),
        }
    }
}

/// Body of a save request.
#[derive(Debug, Clone, Serialize)]
pub struct SaveUserData {
    pub user_id: String,
    pub profile_data: ProfileData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications_txt: Option<String>,
    /// Base64 resume content on upload; the backend answers with a URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_file_name: Option<String>,
}

/// A resume file attached to a profile save.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub base64_content: String,
}

// The backend stores profile_data either as an object or as a JSON string.
fn profile_object_or_string<'de, D>(deserializer: D) -> Result<ProfileData, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map,
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!("profile_data is not a JSON object, using empty profile");
                Map::new()
            }
        },
        _ => Map::new(),
    })
}
