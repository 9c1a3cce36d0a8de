// Fixed-window usage throttling per (user, action).
// Counters are in-memory only; they reset on restart.

pub mod limiter;
pub mod policies;

pub use limiter::{
    RateLimitDecision, RateLimitRecord, RateLimitStatus, RateLimiter, DEFAULT_CLEANUP_INTERVAL,
};
pub use policies::{rate_limit_key, Action, RateLimitConfig, Tier};
