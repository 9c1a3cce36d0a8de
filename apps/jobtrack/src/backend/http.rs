use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BackendError, JobSearchBackend, JobSearchRequest, UserDataBackend};
use crate::models::{JobListing, SaveUserData, UserRecord};

/// Envelope used by the job search endpoint.
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    error: Option<String>,
}

fn build_client(timeout: Duration) -> Result<Client, BackendError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Job search over HTTP: POSTs the query and unwraps the success envelope.
#[derive(Clone)]
pub struct HttpJobSearchBackend {
    client: Client,
    endpoint: String,
}

impl HttpJobSearchBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl JobSearchBackend for HttpJobSearchBackend {
    async fn search(&self, request: &JobSearchRequest) -> Result<Vec<JobListing>, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Job search API returned {}: {}", status, body);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let listings = parse_search_envelope(&body)?;
        debug!(results = listings.len(), "job search call succeeded");
        Ok(listings)
    }
}

pub(crate) fn parse_search_envelope(body: &str) -> Result<Vec<JobListing>, BackendError> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    if envelope.success {
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!(index, "Skipping malformed job listing: {e}");
                    None
                }
            })
            .collect())
    } else {
        Err(BackendError::Rejected(
            envelope
                .error
                .unwrap_or_else(|| "Failed to search jobs".to_string()),
        ))
    }
}

/// Pulls `error` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

/// User data fetch/save endpoints.
#[derive(Clone)]
pub struct HttpUserDataBackend {
    client: Client,
    get_url: String,
    save_url: String,
}

impl HttpUserDataBackend {
    pub fn new(
        get_url: impl Into<String>,
        save_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(timeout)?,
            get_url: get_url.into(),
            save_url: save_url.into(),
        })
    }
}

#[async_trait]
impl UserDataBackend for HttpUserDataBackend {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>, BackendError> {
        let response = self
            .client
            .get(&self.get_url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No stored data for user {user_id}");
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn save(&self, request: &SaveUserData) -> Result<Option<UserRecord>, BackendError> {
        let response = self
            .client
            .post(&self.save_url)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_save_echo(&body))
    }
}

// The save endpoint may answer with the stored row, an acknowledgement, or
// nothing at all. Only a row is useful.
fn parse_save_echo(body: &str) -> Option<UserRecord> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<UserRecord>(body) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("Save response is not a user record: {e}");
            None
        }
    }
}
