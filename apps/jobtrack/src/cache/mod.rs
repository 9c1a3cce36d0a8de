//! Persisted time-boxed caches.
//!
//! Both caches store `TtlEntry` values in a `KeyValueStore` and expire them
//! lazily on read. They never return storage errors: every failure is
//! reported to a `CacheObserver` and the operation degrades to a miss or a
//! no-op, so a broken store can't block a search or a page load.

pub mod search;
pub mod user;

pub use search::{JobSearchCache, SearchCacheStats, SEARCH_CACHE_DURATION, SEARCH_CACHE_KEY};
pub use user::{UserCache, USER_CACHE_DURATION};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::duration_millis;
use crate::storage::StorageError;

/// A cached value and the epoch millis at which it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> TtlEntry<T> {
    pub fn new(data: T, now: i64) -> Self {
        Self {
            data,
            timestamp: now,
        }
    }

    /// Age in millis; negative when the writer's clock was ahead.
    pub fn age(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// Expired once the age exceeds `ttl`.
    pub fn is_expired(&self, now: i64, ttl: Duration) -> bool {
        self.age(now) > duration_millis(ttl)
    }

    /// Expired as soon as the age reaches `ttl`.
    pub fn is_stale(&self, now: i64, ttl: Duration) -> bool {
        self.age(now) >= duration_millis(ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    Read,
    Write,
    Remove,
    Clear,
    Stats,
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheOp::Read => "read",
            CacheOp::Write => "write",
            CacheOp::Remove => "remove",
            CacheOp::Clear => "clear",
            CacheOp::Stats => "stats",
        };
        f.write_str(name)
    }
}

/// Hook for cache failures that were swallowed to keep the caller running.
pub trait CacheObserver: Send + Sync {
    fn storage_failure(&self, cache: &'static str, op: CacheOp, error: &StorageError);
}

/// Default observer: a structured warning per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn storage_failure(&self, cache: &'static str, op: CacheOp, error: &StorageError) {
        warn!(cache, op = %op, error = %error, "cache storage failure, continuing without cache");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_strictly_after_ttl() {
        let entry = TtlEntry::new("x", 1_000);
        let ttl = Duration::from_secs(1);
        assert!(!entry.is_expired(2_000, ttl));
        assert!(entry.is_expired(2_001, ttl));
    }

    #[test]
    fn test_stale_at_exact_ttl() {
        let entry = TtlEntry::new("x", 1_000);
        let ttl = Duration::from_secs(1);
        assert!(!entry.is_stale(1_999, ttl));
        assert!(entry.is_stale(2_000, ttl));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let entry = TtlEntry::new(1, 10_000);
        assert!(entry.age(5_000) < 0);
        assert!(!entry.is_expired(5_000, Duration::from_secs(1)));
    }
}
