use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::backend::{HttpJobSearchBackend, HttpUserDataBackend, JobSearchBackend, UserDataBackend};
use crate::cache::{CacheObserver, JobSearchCache, TracingObserver, UserCache};
use crate::clock::Clock;
use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::services::{ApplicationTracker, JobSearchService, ProfileService, UsageGuard};
use crate::storage::KeyValueStore;

/// Shared application state: one limiter, both caches, and the services
/// built on top of them.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub limiter: Arc<RateLimiter>,
    pub guard: UsageGuard,
    pub search_cache: JobSearchCache,
    pub user_cache: UserCache,
    pub search: JobSearchService,
    pub profiles: ProfileService,
    pub applications: ApplicationTracker,
}

impl AppState {
    pub fn build(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let observer: Arc<dyn CacheObserver> = Arc::new(TracingObserver);
        let search_backend = build_search_backend(&config)?;
        let user_backend = build_user_backend(&config)?;

        Ok(Self::with_backends(
            config,
            store,
            clock,
            observer,
            search_backend,
            user_backend,
        ))
    }

    /// Wires everything around caller-supplied backends.
    pub fn with_backends(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CacheObserver>,
        search_backend: Option<Arc<dyn JobSearchBackend>>,
        user_backend: Option<Arc<dyn UserDataBackend>>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&clock)));
        let guard = UsageGuard::new(Arc::clone(&limiter));

        let search_cache = JobSearchCache::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&observer),
        );
        let user_cache = UserCache::new(store, Arc::clone(&clock), observer);

        let search = JobSearchService::new(search_cache.clone(), guard.clone(), search_backend);
        let profiles = ProfileService::new(user_cache.clone(), guard.clone(), user_backend.clone());
        let applications = ApplicationTracker::new(
            user_cache.clone(),
            guard.clone(),
            user_backend,
            config.save_debounce,
        );

        Self {
            config,
            clock,
            limiter,
            guard,
            search_cache,
            user_cache,
            search,
            profiles,
            applications,
        }
    }

    /// Starts the limiter's periodic cleanup. Needs a tokio runtime.
    pub fn start(&self) {
        self.limiter.start(self.config.cleanup_interval);
    }

    /// Stops the cleanup task and drops all counters.
    pub fn shutdown(&self) {
        self.limiter.destroy();
        info!("jobtrack state shut down");
    }
}

fn build_search_backend(config: &Config) -> Result<Option<Arc<dyn JobSearchBackend>>> {
    let Some(url) = &config.search_api_url else {
        return Ok(None);
    };
    let backend: Arc<dyn JobSearchBackend> =
        Arc::new(HttpJobSearchBackend::new(url.clone(), config.http_timeout)?);
    Ok(Some(backend))
}

fn build_user_backend(config: &Config) -> Result<Option<Arc<dyn UserDataBackend>>> {
    let (Some(get_url), Some(save_url)) = (&config.get_user_url, &config.save_user_url) else {
        return Ok(None);
    };
    let backend: Arc<dyn UserDataBackend> = Arc::new(HttpUserDataBackend::new(
        get_url.clone(),
        save_url.clone(),
        config.http_timeout,
    )?);
    Ok(Some(backend))
}
