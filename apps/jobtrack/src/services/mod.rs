//! Orchestration over the limiter, the caches and the remote backends.

pub mod applications;
pub mod profile;
pub mod search;
pub mod usage;

pub use applications::{ApplicationTracker, DEFAULT_SAVE_DEBOUNCE};
pub use profile::ProfileService;
pub use search::JobSearchService;
pub use usage::{format_reset_in, UsageGuard, UsageLine, UsageReport};
