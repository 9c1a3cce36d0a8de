use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::{CacheObserver, CacheOp, TtlEntry};
use crate::clock::Clock;
use crate::storage::{KeyValueStore, StorageError};

pub const USER_CACHE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Data type names used by the services.
pub const PROFILE: &str = "profile";
pub const APPLICATIONS: &str = "applications";

const CACHE_NAME: &str = "user";

/// Short-lived per-user cache of backend data, one store key per
/// `(user_id, data_type)`.
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl UserCache {
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

    pub fn key(user_id: &str, data_type: &str) -> String {
        format!("user_{user_id}_{data_type}")
    }

    pub fn get<T: DeserializeOwned>(&self, user_id: &str, data_type: &str) -> Option<T> {
        let key = Self::key(user_id, data_type);

        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                self.observer.storage_failure(CACHE_NAME, CacheOp::Read, &e);
                return None;
            }
        };

        let item: TtlEntry<T> = match serde_json::from_str(&raw) {
            Ok(item) => item,
            Err(source) => {
                let e = StorageError::Corrupt { key, source };
                self.observer.storage_failure(CACHE_NAME, CacheOp::Read, &e);
                return None;
            }
        };

        if item.is_stale(self.clock.now_millis(), USER_CACHE_DURATION) {
            debug!(key = %key, "user cache entry expired");
            self.remove(user_id, data_type);
            return None;
        }

        Some(item.data)
    }

    pub fn set<T: Serialize>(&self, user_id: &str, data_type: &str, data: &T) {
        let key = Self::key(user_id, data_type);
        let item = TtlEntry::new(data, self.clock.now_millis());

        let result = serde_json::to_string(&item)
            .map_err(|source| StorageError::Corrupt {
                key: key.clone(),
                source,
            })
            .and_then(|json| self.store.set(&key, &json));

        if let Err(e) = result {
            self.observer.storage_failure(CACHE_NAME, CacheOp::Write, &e);
        }
    }

    pub fn remove(&self, user_id: &str, data_type: &str) {
        if let Err(e) = self.store.remove(&Self::key(user_id, data_type)) {
            self.observer.storage_failure(CACHE_NAME, CacheOp::Remove, &e);
        }
    }

    /// Removes every cached data type for `user_id`, e.g. on sign-out.
    /// Data type names contain no `_`, so `user_u1_x_profile` (user `u1_x`)
    /// is left alone when clearing `u1`.
    pub fn clear_user(&self, user_id: &str) {
        let prefix = format!("user_{user_id}_");

        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                self.observer.storage_failure(CACHE_NAME, CacheOp::Clear, &e);
                return;
            }
        };

        let mut removed = 0;
        let owned = keys.iter().filter(|k| {
            k.strip_prefix(&prefix)
                .is_some_and(|data_type| !data_type.is_empty() && !data_type.contains('_'))
        });
        for key in owned {
            match self.store.remove(key) {
                Ok(()) => removed += 1,
                Err(e) => self.observer.storage_failure(CACHE_NAME, CacheOp::Clear, &e),
            }
        }
        info!(removed, "Cleared cached data for user {user_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::RecordingObserver;
    use crate::clock::ManualClock;
    use crate::models::CachedProfile;
    use crate::storage::MemoryStore;

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        observer: Arc<RecordingObserver>,
        cache: UserCache,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(MemoryStore::new());
        let observer = Arc::new(RecordingObserver::default());
        let cache = UserCache::new(store.clone(), clock.clone(), observer.clone());
        Harness {
            clock,
            store,
            observer,
            cache,
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(UserCache::key("abc", PROFILE), "user_abc_profile");
    }

    #[test]
    fn test_round_trip_typed() {
        let h = harness();
        let mut profile = CachedProfile::default();
        profile
            .form_data
            .insert("firstName".into(), serde_json::json!("Ada"));
        profile.resume_url = Some("https://files/ada.pdf".into());

        h.cache.set("u1", PROFILE, &profile);
        let cached: Option<CachedProfile> = h.cache.get("u1", PROFILE);
        assert_eq!(cached, Some(profile));
    }

    #[test]
    fn test_entries_are_independent() {
        let h = harness();
        h.cache.set("u1", PROFILE, &1u32);
        h.cache.set("u1", APPLICATIONS, &2u32);
        h.cache.set("u2", PROFILE, &3u32);

        h.cache.remove("u1", PROFILE);
        assert_eq!(h.cache.get::<u32>("u1", PROFILE), None);
        assert_eq!(h.cache.get::<u32>("u1", APPLICATIONS), Some(2));
        assert_eq!(h.cache.get::<u32>("u2", PROFILE), Some(3));
    }

    #[test]
    fn test_expires_after_five_minutes() {
        let h = harness();
        h.cache.set("u1", APPLICATIONS, &vec!["a".to_string()]);

        h.clock.advance(Duration::from_secs(4 * 60));
        assert!(h.cache.get::<Vec<String>>("u1", APPLICATIONS).is_some());

        h.clock.advance(Duration::from_secs(60));
        assert!(h.cache.get::<Vec<String>>("u1", APPLICATIONS).is_none());
        assert!(h.store.get("user_u1_applications").unwrap().is_none());
    }

    #[test]
    fn test_persisted_shape() {
        let h = harness();
        h.cache.set("u1", PROFILE, &serde_json::json!({ "a": 1 }));
        let raw: serde_json::Value =
            serde_json::from_str(&h.store.get("user_u1_profile").unwrap().unwrap()).unwrap();
        assert_eq!(raw["data"]["a"], 1);
        assert_eq!(raw["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_shape_mismatch_is_reported_miss() {
        let h = harness();
        h.cache.set("u1", PROFILE, &"just a string");
        assert_eq!(h.cache.get::<CachedProfile>("u1", PROFILE), None);
        assert_eq!(h.observer.ops(), vec![CacheOp::Read]);
    }

    #[test]
    fn test_clear_user_only_touches_that_user() {
        let h = harness();
        h.cache.set("u1", PROFILE, &1u8);
        h.cache.set("u1", APPLICATIONS, &1u8);
        h.cache.set("u10", PROFILE, &1u8);
        h.store.set("job_search_cache", "[]").unwrap();

        h.cache.clear_user("u1");

        let mut keys = h.store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["job_search_cache", "user_u10_profile"]);
    }

    #[test]
    fn test_clear_user_spares_ids_sharing_a_prefix() {
        let h = harness();
        h.cache.set("u1", PROFILE, &1u8);
        h.cache.set("u1_x", PROFILE, &2u8);
        h.cache.set("u1_x", APPLICATIONS, &3u8);

        h.cache.clear_user("u1");

        assert_eq!(h.cache.get::<u8>("u1", PROFILE), None);
        assert_eq!(h.cache.get::<u8>("u1_x", PROFILE), Some(2));
        assert_eq!(h.cache.get::<u8>("u1_x", APPLICATIONS), Some(3));
    }

    #[test]
    fn test_stale_at_exactly_five_minutes() {
        let h = harness();
        h.cache.set("u1", PROFILE, &1u8);
        h.clock.advance(USER_CACHE_DURATION - Duration::from_millis(1));
        assert_eq!(h.cache.get::<u8>("u1", PROFILE), Some(1));
        h.clock.advance(Duration::from_millis(1));
        assert_eq!(h.cache.get::<u8>("u1", PROFILE), None);
    }
}
