//! Remote collaborators: the job search endpoint and the user data endpoints.
//!
//! Services depend on the traits, never on `reqwest` directly, so tests swap
//! in scripted backends.

pub mod http;

pub use http::{HttpJobSearchBackend, HttpUserDataBackend};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{JobListing, JobSearchParams, SaveUserData, UserRecord};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Body sent to the job search endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearchRequest {
    #[serde(flatten)]
    pub params: JobSearchParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub is_pro: bool,
}

#[async_trait]
pub trait JobSearchBackend: Send + Sync {
    async fn search(&self, request: &JobSearchRequest) -> Result<Vec<JobListing>, BackendError>;
}

#[async_trait]
pub trait UserDataBackend: Send + Sync {
    /// `Ok(None)` when the user has no stored record yet.
    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>, BackendError>;

    /// Returns the stored record when the backend echoes one back.
    async fn save(&self, request: &SaveUserData) -> Result<Option<UserRecord>, BackendError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub fn listing(key: &str, title: &str) -> JobListing {
        serde_json::from_value(serde_json::json!({ "key": key, "title": title })).unwrap()
    }

    /// Answers every search with one listing titled after the query.
    #[derive(Default)]
    pub struct ScriptedSearch {
        calls: AtomicUsize,
        pub fail_with: Option<String>,
        /// Raw response body run through the HTTP envelope parser.
        pub reply: Option<String>,
    }

    impl ScriptedSearch {
        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        pub fn replying(body: &str) -> Self {
            Self {
                reply: Some(body.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobSearchBackend for ScriptedSearch {
        async fn search(
            &self,
            request: &JobSearchRequest,
        ) -> Result<Vec<JobListing>, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.fail_with {
                return Err(BackendError::Rejected(message.clone()));
            }
            if let Some(body) = &self.reply {
                return super::http::parse_search_envelope(body);
            }
            let title = request.params.title.clone().unwrap_or_default();
            Ok(vec![listing(&n.to_string(), &title)])
        }
    }

    /// In-memory user row; saves overwrite it and are recorded.
    #[derive(Default)]
    pub struct ScriptedUsers {
        pub record: Mutex<Option<UserRecord>>,
        pub saves: Mutex<Vec<SaveUserData>>,
        fetches: AtomicUsize,
        /// URL echoed back when a save carries a resume.
        pub uploaded_url: Option<String>,
    }

    impl ScriptedUsers {
        pub fn with_record(record: UserRecord) -> Self {
            Self {
                record: Mutex::new(Some(record)),
                ..Default::default()
            }
        }

        pub fn uploading_to(mut self, url: &str) -> Self {
            self.uploaded_url = Some(url.to_string());
            self
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub fn saves(&self) -> Vec<SaveUserData> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UserDataBackend for ScriptedUsers {
        async fn fetch(&self, _user_id: &str) -> Result<Option<UserRecord>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.lock().unwrap().clone())
        }

        async fn save(&self, request: &SaveUserData) -> Result<Option<UserRecord>, BackendError> {
            self.saves.lock().unwrap().push(request.clone());

            let mut slot = self.record.lock().unwrap();
            let record = slot.get_or_insert_with(UserRecord::default);
            record.profile_data = request.profile_data.clone();
            if request.applications_txt.is_some() {
                record.applications_txt = request.applications_txt.clone();
            }
            if request.resume_file_url.is_some() {
                record.resume_file_url = self.uploaded_url.clone();
            }
            Ok(Some(record.clone()))
        }
    }
}
