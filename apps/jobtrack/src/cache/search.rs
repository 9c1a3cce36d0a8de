use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CacheObserver, CacheOp, TtlEntry};
use crate::clock::Clock;
use crate::models::{JobListing, JobSearchParams};
use crate::storage::{KeyValueStore, StorageError};

/// Store key holding the whole search cache collection.
pub const SEARCH_CACHE_KEY: &str = "job_search_cache";
pub const SEARCH_CACHE_DURATION: Duration = Duration::from_secs(60 * 60);
/// Only the most recent searches are kept.
pub const MAX_SEARCH_ENTRIES: usize = 10;

const CACHE_NAME: &str = "job_search";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchCacheEntry {
    #[serde(flatten)]
    entry: TtlEntry<Vec<JobListing>>,
    /// Canonical query key, see `JobSearchParams::cache_key`.
    params: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchCacheStats {
    pub total_entries: usize,
    /// Millis since the oldest entry was written.
    pub oldest_age: i64,
    pub newest_age: i64,
}

/// Memoizes job search results so a repeated query neither hits the network
/// nor spends rate-limit quota.
///
/// Entries are kept in insertion order as one JSON array; re-caching a query
/// moves it to the end, and the front is evicted once more than
/// `MAX_SEARCH_ENTRIES` are stored.
#[derive(Clone)]
pub struct JobSearchCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl JobSearchCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        Self {
            store,
            clock,
            observer,
        }
    }

    pub fn get(&self, params: &JobSearchParams) -> Option<Vec<JobListing>> {
        let key = params.cache_key();
        let entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                self.observer.storage_failure(CACHE_NAME, CacheOp::Read, &e);
                return None;
            }
        };

        let found = entries.into_iter().find(|e| e.params == key)?;
        let now = self.clock.now_millis();

        if found.entry.is_expired(now, SEARCH_CACHE_DURATION) {
            debug!(params = %key, "cached search expired");
            self.remove_key(&key);
            return None;
        }

        debug!(
            results = found.entry.data.len(),
            age_minutes = found.entry.age(now) / 60_000,
            "using cached job search results"
        );
        Some(found.entry.data)
    }

    pub fn set(&self, params: &JobSearchParams, data: Vec<JobListing>) {
        let key = params.cache_key();
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e @ StorageError::Corrupt { .. }) => {
                // unreadable collection is replaced wholesale
                self.observer.storage_failure(CACHE_NAME, CacheOp::Read, &e);
                Vec::new()
            }
            Err(e) => {
                self.observer.storage_failure(CACHE_NAME, CacheOp::Write, &e);
                return;
            }
        };

        entries.retain(|e| e.params != key);
        entries.push(SearchCacheEntry {
            entry: TtlEntry::new(data, self.clock.now_millis()),
            params: key,
        });

        if entries.len() > MAX_SEARCH_ENTRIES {
            let excess = entries.len() - MAX_SEARCH_ENTRIES;
            entries.drain(..excess);
        }

        match self.save(&entries) {
            Ok(()) => debug!(entries = entries.len(), "job search results cached"),
            Err(e) => self.observer.storage_failure(CACHE_NAME, CacheOp::Write, &e),
        }
    }

    pub fn remove(&self, params: &JobSearchParams) {
        self.remove_key(&params.cache_key());
    }

    pub fn clear(&self) {
        match self.store.remove(SEARCH_CACHE_KEY) {
            Ok(()) => info!("Job search cache cleared"),
            Err(e) => self.observer.storage_failure(CACHE_NAME, CacheOp::Clear, &e),
        }
    }

    /// `None` when nothing is cached or the store can't be read.
    pub fn stats(&self) -> Option<SearchCacheStats> {
        let entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                self.observer.storage_failure(CACHE_NAME, CacheOp::Stats, &e);
                return None;
            }
        };

        let now = self.clock.now_millis();
        let ages = entries.iter().map(|e| e.entry.age(now));
        Some(SearchCacheStats {
            total_entries: entries.len(),
            oldest_age: ages.clone().max()?,
            newest_age: ages.min()?,
        })
    }

    fn remove_key(&self, key: &str) {
        let result = self.load().and_then(|mut entries| {
            let before = entries.len();
            entries.retain(|e| e.params != key);
            if entries.len() == before {
                return Ok(());
            }
            self.save(&entries)
        });

        if let Err(e) = result {
            self.observer.storage_failure(CACHE_NAME, CacheOp::Remove, &e);
        }
    }

    fn load(&self) -> Result<Vec<SearchCacheEntry>, StorageError> {
        match self.store.get(SEARCH_CACHE_KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                key: SEARCH_CACHE_KEY.to_string(),
                source,
            }),
        }
    }

    fn save(&self, entries: &[SearchCacheEntry]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries).map_err(|source| StorageError::Corrupt {
            key: SEARCH_CACHE_KEY.to_string(),
            source,
        })?;
        self.store.set(SEARCH_CACHE_KEY, &json)
    }
}
