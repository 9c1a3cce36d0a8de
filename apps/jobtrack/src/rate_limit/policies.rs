use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::duration_millis;

/// Policy for one kind of action: at most `max_requests` per fixed `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Shown to the user on rejection. `None` falls back to a generated
    /// "try again in N seconds" message.
    pub message: Option<Cow<'static, str>>,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn window_millis(&self) -> i64 {
        duration_millis(self.window)
    }
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

pub const JOB_SEARCH_FREE: RateLimitConfig = RateLimitConfig {
    max_requests: 5,
    window: Duration::from_secs(30 * MINUTE),
    message: Some(Cow::Borrowed(
        "Job search limit reached. Please try again later.",
    )),
};

pub const JOB_SEARCH_PRO: RateLimitConfig = RateLimitConfig {
    max_requests: 10,
    window: Duration::from_secs(30 * MINUTE),
    message: Some(Cow::Borrowed(
        "Job search limit reached. Please try again later.",
    )),
};

pub const DOCUMENT_GENERATION_RESUME: RateLimitConfig = RateLimitConfig {
    max_requests: 1,
    window: Duration::from_secs(MINUTE),
    message: Some(Cow::Borrowed(
        "Resume generation limit reached. Please wait 1 minute.",
    )),
};

pub const DOCUMENT_GENERATION_COVER_LETTER: RateLimitConfig = RateLimitConfig {
    max_requests: 1,
    window: Duration::from_secs(MINUTE),
    message: Some(Cow::Borrowed(
        "Cover letter generation limit reached. Please wait 1 minute.",
    )),
};

pub const JOB_AUTOMATION_PRO: RateLimitConfig = RateLimitConfig {
    max_requests: 3,
    window: Duration::from_secs(24 * HOUR),
    message: Some(Cow::Borrowed(
        "Daily automation limit reached. Try again tomorrow.",
    )),
};

pub const SAVE_APPLICATIONS: RateLimitConfig = RateLimitConfig {
    max_requests: 1,
    window: Duration::from_secs(10),
    message: Some(Cow::Borrowed("Please wait 10 seconds before saving again.")),
};

pub const SAVE_PROFILE: RateLimitConfig = RateLimitConfig {
    max_requests: 1,
    window: Duration::from_secs(10),
    message: Some(Cow::Borrowed("Please wait 10 seconds before saving again.")),
};

pub const STATUS_CHANGE: RateLimitConfig = RateLimitConfig {
    max_requests: 1,
    window: Duration::from_secs(3),
    message: Some(Cow::Borrowed(
        "Please wait 3 seconds before changing status again.",
    )),
};

/// Subscription level of the user issuing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn from_pro_flag(is_pro: bool) -> Self {
        if is_pro {
            Tier::Pro
        } else {
            Tier::Free
        }
    }
}

/// Every rate-limited action, each with a stable endpoint name used in the
/// limiter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    JobSearch,
    ResumeGeneration,
    CoverLetterGeneration,
    Automation,
    SaveApplications,
    SaveProfile,
    StatusChange,
}

impl Action {
    pub fn endpoint(self) -> &'static str {
        match self {
            Action::JobSearch => "job-search",
            Action::ResumeGeneration => "document-generation-resume",
            Action::CoverLetterGeneration => "document-generation-cover-letter",
            Action::Automation => "job-automation",
            Action::SaveApplications => "save-applications",
            Action::SaveProfile => "save-profile",
            Action::StatusChange => "status-change",
        }
    }

    /// Policy governing this action for `tier`. Automation is a Pro feature,
    /// so free users get `None`.
    pub fn policy(self, tier: Tier) -> Option<RateLimitConfig> {
        let config = match (self, tier) {
            (Action::JobSearch, Tier::Free) => JOB_SEARCH_FREE,
            (Action::JobSearch, Tier::Pro) => JOB_SEARCH_PRO,
            (Action::ResumeGeneration, _) => DOCUMENT_GENERATION_RESUME,
            (Action::CoverLetterGeneration, _) => DOCUMENT_GENERATION_COVER_LETTER,
            (Action::Automation, Tier::Pro) => JOB_AUTOMATION_PRO,
            (Action::Automation, Tier::Free) => return None,
            (Action::SaveApplications, _) => SAVE_APPLICATIONS,
            (Action::SaveProfile, _) => SAVE_PROFILE,
            (Action::StatusChange, _) => STATUS_CHANGE,
        };
        Some(config)
    }
}

/// Limiter key for a user and endpoint: `"{user_id}:{endpoint}"`.
pub fn rate_limit_key(user_id: &str, endpoint: &str) -> String {
    format!("{user_id}:{endpoint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table_values() {
        let cases = [
            (Action::JobSearch, Tier::Free, 5, 30 * 60),
            (Action::JobSearch, Tier::Pro, 10, 30 * 60),
            (Action::ResumeGeneration, Tier::Pro, 1, 60),
            (Action::CoverLetterGeneration, Tier::Free, 1, 60),
            (Action::Automation, Tier::Pro, 3, 24 * 60 * 60),
            (Action::SaveApplications, Tier::Free, 1, 10),
            (Action::SaveProfile, Tier::Pro, 1, 10),
            (Action::StatusChange, Tier::Free, 1, 3),
        ];

        for (action, tier, max, secs) in cases {
            let policy = action.policy(tier).unwrap();
            assert_eq!(policy.max_requests, max, "{action:?}/{tier:?}");
            assert_eq!(policy.window, Duration::from_secs(secs), "{action:?}/{tier:?}");
            assert!(policy.message.is_some());
        }
    }

    #[test]
    fn test_automation_unavailable_on_free_tier() {
        assert!(Action::Automation.policy(Tier::Free).is_none());
    }

    #[test]
    fn test_rate_limit_key_format() {
        assert_eq!(
            rate_limit_key("uid-42", Action::JobSearch.endpoint()),
            "uid-42:job-search"
        );
    }

    #[test]
    fn test_window_millis() {
        assert_eq!(DOCUMENT_GENERATION_RESUME.window_millis(), 60_000);
        assert_eq!(STATUS_CHANGE.window_millis(), 3_000);
    }
}
