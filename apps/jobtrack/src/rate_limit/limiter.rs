use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::policies::RateLimitConfig;
use crate::clock::Clock;

/// How often stale records are swept by the background task.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Counter state for one key inside its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    /// Epoch millis at which the window ends.
    pub reset_time: i64,
}

impl RateLimitRecord {
    fn fresh(now: i64, window_ms: i64) -> Self {
        Self {
            count: 1,
            reset_time: now.saturating_add(window_ms),
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        now >= self.reset_time
    }
}

/// Non-consuming view of a key, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub remaining: u32,
    /// `0` when no window is active.
    pub reset_time: i64,
}

/// Outcome of a consuming check. A denial is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fixed-window limiter keyed by `"{subject}:{action}"`.
///
/// Counters live in memory only. Construct one per application and hand it
/// around in an `Arc`; the owner decides when the cleanup task runs.
pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
    clock: Arc<dyn Clock>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
            cleanup_task: Mutex::new(None),
        }
    }

    pub fn peek(&self, key: &str, config: &RateLimitConfig) -> RateLimitStatus {
        let now = self.clock.now_millis();

        match self.records.get(key) {
            Some(record) if !record.is_expired(now) => RateLimitStatus {
                remaining: config.max_requests.saturating_sub(record.count),
                reset_time: record.reset_time,
            },
            _ => RateLimitStatus {
                remaining: config.max_requests,
                reset_time: 0,
            },
        }
    }

    pub fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitDecision {
        let now = self.clock.now_millis();

        if config.max_requests == 0 {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: 0,
                message: Some(
                    config
                        .message
                        .as_deref()
                        .unwrap_or("Rate limit exceeded.")
                        .to_string(),
                ),
            };
        }

        let window_ms = config.window_millis();

        match self.records.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let record = slot.insert(RateLimitRecord::fresh(now, window_ms));
                allowed(config.max_requests - 1, record.reset_time)
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();

                if record.is_expired(now) {
                    *record = RateLimitRecord::fresh(now, window_ms);
                    return allowed(config.max_requests - 1, record.reset_time);
                }

                if record.count < config.max_requests {
                    record.count += 1;
                    return allowed(config.max_requests - record.count, record.reset_time);
                }

                debug!(key, reset_time = record.reset_time, "rate limit exceeded");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_time: record.reset_time,
                    message: Some(rejection_message(config, record.reset_time - now)),
                }
            }
        }
    }

    pub fn reset(&self, key: &str) {
        self.records.remove(key);
    }

    pub fn clear_all(&self) {
        self.records.clear();
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Drops every record whose window has ended. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(removed, remaining = self.records.len(), "rate limit cleanup");
        }
        removed
    }

    /// Starts the periodic cleanup task. Calling it again replaces the
    /// running task. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, every: Duration) {
        // the task must not keep the limiter alive
        let limiter = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.cleanup();
            }
        });

        let previous = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!("Rate limiter cleanup started (every {:?})", every);
    }

    pub fn is_running(&self) -> bool {
        self.cleanup_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stops the cleanup task and forgets every counter.
    pub fn destroy(&self) {
        if let Some(handle) = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
            info!("Rate limiter cleanup stopped");
        }
        self.records.clear();
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self
            .cleanup_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

fn allowed(remaining: u32, reset_time: i64) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        remaining,
        reset_time,
        message: None,
    }
}

fn rejection_message(config: &RateLimitConfig, millis_left: i64) -> String {
    if let Some(message) = &config.message {
        return message.to_string();
    }

    let seconds = (millis_left.max(0) + 999) / 1000;
    let plural = if seconds == 1 { "" } else { "s" };
    format!("Rate limit exceeded. Try again in {seconds} second{plural}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::policies::{DOCUMENT_GENERATION_RESUME, JOB_SEARCH_FREE};

    const START: i64 = 1_700_000_000_000;

    fn limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::new(clock.clone());
        (clock, limiter)
    }

    fn bare(max: u32, secs: u64) -> RateLimitConfig {
        RateLimitConfig::new(max, Duration::from_secs(secs))
    }

    #[test]
    fn test_allows_max_then_denies() {
        let (_, limiter) = limiter();
        let config = bare(3, 60);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("u1:job-search", &config);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert!(decision.message.is_none());
        }

        let denied = limiter.check("u1:job-search", &config);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_time, START + 60_000);
    }

    #[test]
    fn test_first_check_opens_window() {
        let (_, limiter) = limiter();
        let decision = limiter.check("k", &bare(5, 30));
        assert_eq!(decision.reset_time, START + 30_000);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_denied_state_visible_to_peek_and_check() {
        let (clock, limiter) = limiter();
        let config = bare(1, 10);

        assert!(limiter.check("k", &config).allowed);
        assert!(!limiter.check("k", &config).allowed);

        clock.advance(Duration::from_secs(5));
        let status = limiter.peek("k", &config);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.reset_time, START + 10_000);
        assert_eq!(limiter.check("k", &config).remaining, 0);
    }

    #[test]
    fn test_window_elapsed_starts_fresh() {
        let (clock, limiter) = limiter();
        let config = bare(2, 10);

        limiter.check("k", &config);
        limiter.check("k", &config);
        assert!(!limiter.check("k", &config).allowed);

        clock.advance(Duration::from_secs(10));
        let decision = limiter.check("k", &config);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_time, START + 20_000);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (_, limiter) = limiter();
        let config = bare(2, 60);

        for _ in 0..10 {
            let status = limiter.peek("k", &config);
            assert_eq!(status.remaining, 2);
            assert_eq!(status.reset_time, 0);
        }

        assert!(limiter.check("k", &config).allowed);
        assert_eq!(limiter.peek("k", &config).remaining, 1);
        assert_eq!(limiter.peek("k", &config).remaining, 1);
        assert!(limiter.check("k", &config).allowed);
        assert!(!limiter.check("k", &config).allowed);
    }

    #[test]
    fn test_peek_after_expiry_reports_no_window() {
        let (clock, limiter) = limiter();
        let config = bare(1, 1);
        limiter.check("k", &config);
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            limiter.peek("k", &config),
            RateLimitStatus {
                remaining: 1,
                reset_time: 0
            }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let (_, limiter) = limiter();
        let config = bare(1, 60);
        assert!(limiter.check("u1:job-search", &config).allowed);
        assert!(!limiter.check("u1:job-search", &config).allowed);
        assert!(limiter.check("u2:job-search", &config).allowed);
        assert!(limiter.check("u1:save-profile", &config).allowed);
    }

    #[test]
    fn test_config_message_used_on_denial() {
        let (_, limiter) = limiter();
        limiter.check("k", &JOB_SEARCH_FREE);
        for _ in 0..4 {
            limiter.check("k", &JOB_SEARCH_FREE);
        }
        let denied = limiter.check("k", &JOB_SEARCH_FREE);
        assert_eq!(
            denied.message.as_deref(),
            Some("Job search limit reached. Please try again later.")
        );
    }

    #[test]
    fn test_default_message_counts_seconds() {
        let (clock, limiter) = limiter();
        let config = bare(1, 30);
        limiter.check("k", &config);

        clock.advance(Duration::from_millis(500));
        let denied = limiter.check("k", &config);
        assert_eq!(
            denied.message.as_deref(),
            Some("Rate limit exceeded. Try again in 30 seconds.")
        );

        clock.advance(Duration::from_millis(28_600));
        let denied = limiter.check("k", &config);
        assert_eq!(
            denied.message.as_deref(),
            Some("Rate limit exceeded. Try again in 1 second.")
        );
    }

    #[test]
    fn test_resume_generation_one_per_minute() {
        let (clock, limiter) = limiter();
        let key = "u1:document-generation-resume";

        assert!(limiter.check(key, &DOCUMENT_GENERATION_RESUME).allowed);
        clock.advance(Duration::from_secs(30));
        assert!(!limiter.check(key, &DOCUMENT_GENERATION_RESUME).allowed);
        clock.advance(Duration::from_secs(30));
        assert!(limiter.check(key, &DOCUMENT_GENERATION_RESUME).allowed);
    }

    #[test]
    fn test_zero_max_always_denies() {
        let (_, limiter) = limiter();
        let decision = limiter.check("k", &bare(0, 60));
        assert!(!decision.allowed);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_reset_and_clear_all() {
        let (_, limiter) = limiter();
        let config = bare(1, 60);
        limiter.check("a", &config);
        limiter.check("b", &config);

        limiter.reset("a");
        assert!(limiter.check("a", &config).allowed);
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.clear_all();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.check("b", &config).allowed);
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let (clock, limiter) = limiter();
        limiter.check("short", &bare(1, 1));
        limiter.check("long", &bare(1, 600));

        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.peek("long", &bare(1, 600)).remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup_and_destroy() {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = Arc::new(RateLimiter::new(clock.clone()));
        limiter.check("k", &bare(1, 1));

        limiter.start(Duration::from_secs(300));
        assert!(limiter.is_running());

        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(limiter.tracked_keys(), 0);

        limiter.check("k", &bare(1, 60));
        limiter.destroy();
        assert!(!limiter.is_running());
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_limiter_stops_cleanup_task() {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = Arc::new(RateLimiter::new(clock));
        limiter.start(Duration::from_secs(1));

        let weak = Arc::downgrade(&limiter);
        drop(limiter);
        assert!(weak.upgrade().is_none());

        // ticking past the interval with no limiter left must not panic
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}
