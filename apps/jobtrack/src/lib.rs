//! Client-side usage limits and caches for the job seeker app: a fixed-window
//! rate limiter, a persisted job search cache and a short-lived per-user
//! cache, plus the services that combine them with the remote backends.

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod errors;
pub mod models;
pub mod rate_limit;
pub mod services;
pub mod state;
pub mod storage;
