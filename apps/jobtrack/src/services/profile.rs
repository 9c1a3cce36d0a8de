use std::sync::Arc;

use tracing::{debug, info};

use super::usage::UsageGuard;
use crate::backend::UserDataBackend;
use crate::cache::user::PROFILE;
use crate::cache::UserCache;
use crate::errors::AppError;
use crate::models::{CachedProfile, ProfileData, ResumeUpload, SaveUserData};
use crate::rate_limit::{Action, Tier};

/// Profile form data, read through the per-user cache.
#[derive(Clone)]
pub struct ProfileService {
    cache: UserCache,
    guard: UsageGuard,
    backend: Option<Arc<dyn UserDataBackend>>,
}

impl ProfileService {
    pub fn new(
        cache: UserCache,
        guard: UsageGuard,
        backend: Option<Arc<dyn UserDataBackend>>,
    ) -> Self {
        Self {
            cache,
            guard,
            backend,
        }
    }

    fn backend(&self) -> Result<&Arc<dyn UserDataBackend>, AppError> {
        self.backend
            .as_ref()
            .ok_or(AppError::NotConfigured("JOBTRACK_GET_USER_URL"))
    }

    /// `None` when the user has never saved a profile.
    pub async fn load(&self, user_id: &str) -> Result<Option<CachedProfile>, AppError> {
        if let Some(cached) = self.cache.get::<CachedProfile>(user_id, PROFILE) {
            debug!("Using cached profile for {user_id}");
            return Ok(Some(cached));
        }

        let Some(record) = self.backend()?.fetch(user_id).await? else {
            return Ok(None);
        };

        let profile = CachedProfile {
            form_data: record.profile_data,
            resume_url: record.resume_file_url,
        };
        self.cache.set(user_id, PROFILE, &profile);
        Ok(Some(profile))
    }

    /// Saves `form_data`, optionally uploading a new resume. The cached
    /// profile is refreshed with whatever resume URL is current afterwards.
    pub async fn save(
        &self,
        user_id: &str,
        form_data: ProfileData,
        resume: Option<ResumeUpload>,
    ) -> Result<CachedProfile, AppError> {
        self.guard.consume(user_id, Tier::Free, Action::SaveProfile)?;
        let backend = self.backend()?;

        let previous_url = self
            .cache
            .get::<CachedProfile>(user_id, PROFILE)
            .and_then(|p| p.resume_url);

        let (resume_file_url, resume_file_name) = match resume {
            Some(upload) => (Some(upload.base64_content), Some(upload.file_name)),
            None => (None, None),
        };
        let request = SaveUserData {
            user_id: user_id.to_string(),
            profile_data: form_data.clone(),
            applications_txt: None,
            resume_file_url,
            resume_file_name,
        };

        let echoed = backend.save(&request).await?;

        let profile = CachedProfile {
            form_data,
            resume_url: echoed
                .and_then(|record| record.resume_file_url)
                .or(previous_url),
        };
        self.cache.set(user_id, PROFILE, &profile);
        info!("Profile saved for {user_id}");
        Ok(profile)
    }
}
