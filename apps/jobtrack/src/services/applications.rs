use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info};

use super::usage::UsageGuard;
use crate::backend::{BackendError, UserDataBackend};
use crate::cache::user::APPLICATIONS;
use crate::cache::UserCache;
use crate::debounce::Debouncer;
use crate::errors::AppError;
use crate::models::{Application, ApplicationStatus, SaveUserData};
use crate::rate_limit::{Action, Tier};

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// The user's tracked applications, persisted as `applications_txt` next to
/// the profile.
///
/// Edits are saved through a per-user debounce so a burst of status changes
/// turns into a single backend write.
#[derive(Clone)]
pub struct ApplicationTracker {
    cache: UserCache,
    guard: UsageGuard,
    backend: Option<Arc<dyn UserDataBackend>>,
    save_delay: Duration,
    pending: Arc<DashMap<String, Debouncer>>,
}

impl ApplicationTracker {
    pub fn new(
        cache: UserCache,
        guard: UsageGuard,
        backend: Option<Arc<dyn UserDataBackend>>,
        save_delay: Duration,
    ) -> Self {
        Self {
            cache,
            guard,
            backend,
            save_delay,
            pending: Arc::new(DashMap::new()),
        }
    }

    fn backend(&self) -> Result<&Arc<dyn UserDataBackend>, AppError> {
        self.backend
            .as_ref()
            .ok_or(AppError::NotConfigured("JOBTRACK_GET_USER_URL"))
    }

    pub async fn load(&self, user_id: &str) -> Result<Vec<Application>, AppError> {
        if let Some(cached) = self.cache.get::<Vec<Application>>(user_id, APPLICATIONS) {
            return Ok(cached);
        }

        let applications = match self.backend()?.fetch(user_id).await? {
            Some(record) => record.applications().map_err(BackendError::Parse)?,
            None => Vec::new(),
        };

        self.cache.set(user_id, APPLICATIONS, &applications);
        debug!(count = applications.len(), "Loaded applications for {user_id}");
        Ok(applications)
    }

    /// Updates one application in place and in the cache. Saving is left to
    /// the caller, usually via `schedule_save`.
    pub fn change_status(
        &self,
        user_id: &str,
        applications: &mut [Application],
        application_id: &str,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        self.guard
            .consume(user_id, Tier::Free, Action::StatusChange)?;

        let application = applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or_else(|| AppError::NotFound(format!("application {application_id}")))?;
        application.status = status;

        self.cache.set(user_id, APPLICATIONS, &applications);
        Ok(())
    }

    /// Saves after the debounce delay, superseding any save still waiting
    /// for this user. Errors are logged, not returned.
    pub fn schedule_save(&self, user_id: &str, applications: Vec<Application>) {
        let backend = match self.backend() {
            Ok(backend) => Arc::clone(backend),
            Err(e) => {
                error!("Cannot save applications for {user_id}: {e}");
                return;
            }
        };
        let cache = self.cache.clone();
        let pending = Arc::clone(&self.pending);
        let owner = user_id.to_string();

        let action = async move {
            match persist(backend.as_ref(), &cache, &owner, &applications).await {
                Ok(()) => info!(count = applications.len(), "Applications saved for {owner}"),
                Err(e) => error!("Failed to save applications for {owner}: {e}"),
            }
            // keep the entry if another save was scheduled meanwhile
            pending.remove_if(&owner, |_, debouncer| !debouncer.is_pending());
        };

        self.pending
            .entry(user_id.to_string())
            .or_insert_with(|| Debouncer::new(self.save_delay))
            .trigger(action);
    }

    /// Saves right away, bypassing the debounce but not the save limit.
    pub async fn save_now(
        &self,
        user_id: &str,
        applications: &[Application],
    ) -> Result<(), AppError> {
        self.guard
            .consume(user_id, Tier::Free, Action::SaveApplications)?;
        self.cancel_pending(user_id);
        persist(self.backend()?.as_ref(), &self.cache, user_id, applications).await
    }

    pub fn has_pending_save(&self, user_id: &str) -> bool {
        self.pending
            .get(user_id)
            .is_some_and(|debouncer| debouncer.is_pending())
    }

    /// Users with a debouncer entry, pending or running.
    pub fn tracked_users(&self) -> usize {
        self.pending.len()
    }

    pub fn cancel_pending(&self, user_id: &str) -> bool {
        self.pending
            .remove(user_id)
            .is_some_and(|(_, debouncer)| debouncer.cancel())
    }
}

// The save endpoint overwrites the whole row, so the current profile is
// fetched and sent back alongside the applications.
async fn persist(
    backend: &dyn UserDataBackend,
    cache: &UserCache,
    user_id: &str,
    applications: &[Application],
) -> Result<(), AppError> {
    let current = backend.fetch(user_id).await?;
    let applications_txt = serde_json::to_string(applications).map_err(BackendError::Parse)?;

    let request = SaveUserData {
        user_id: user_id.to_string(),
        profile_data: current.map(|r| r.profile_data).unwrap_or_default(),
        applications_txt: Some(applications_txt),
        resume_file_url: None,
        resume_file_name: None,
    };
    backend.save(&request).await?;

    cache.set(user_id, APPLICATIONS, &applications);
    Ok(())
}
