use std::sync::Arc;

use tracing::{debug, info};

use super::usage::UsageGuard;
use crate::backend::{JobSearchBackend, JobSearchRequest};
use crate::cache::JobSearchCache;
use crate::errors::AppError;
use crate::models::{JobListing, JobSearchParams};
use crate::rate_limit::{Action, Tier};

/// Cache-first job search. Quota is only spent when the backend is called.
#[derive(Clone)]
pub struct JobSearchService {
    cache: JobSearchCache,
    guard: UsageGuard,
    backend: Option<Arc<dyn JobSearchBackend>>,
}

impl JobSearchService {
    pub fn new(
        cache: JobSearchCache,
        guard: UsageGuard,
        backend: Option<Arc<dyn JobSearchBackend>>,
    ) -> Self {
        Self {
            cache,
            guard,
            backend,
        }
    }

    pub fn cache(&self) -> &JobSearchCache {
        &self.cache
    }

    /// Anonymous searches (`user_id == None`) skip the rate limiter.
    pub async fn search(
        &self,
        user_id: Option<&str>,
        is_pro: bool,
        params: &JobSearchParams,
    ) -> Result<Vec<JobListing>, AppError> {
        if let Some(cached) = self.cache.get(params) {
            return Ok(cached);
        }

        if let Some(user_id) = user_id {
            self.guard
                .consume(user_id, Tier::from_pro_flag(is_pro), Action::JobSearch)?;
        }

        let backend = self
            .backend
            .as_ref()
            .ok_or(AppError::NotConfigured("JOBTRACK_SEARCH_API_URL"))?;

        let request = JobSearchRequest {
            params: params.clone(),
            user_id: user_id.map(str::to_string),
            is_pro,
        };
        debug!(params = %params.cache_key(), "calling job search backend");
        let listings = backend.search(&request).await?;

        info!(results = listings.len(), "Job search completed");
        self.cache.set(params, listings.clone());
        Ok(listings)
    }
}
