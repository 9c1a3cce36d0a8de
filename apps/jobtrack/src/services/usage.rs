use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::rate_limit::{rate_limit_key, Action, RateLimitDecision, RateLimiter, Tier};

/// Applies the per-action policies to a user. Every rate-limited call site
/// goes through here so key composition and tier selection live in one place.
#[derive(Clone)]
pub struct UsageGuard {
    limiter: Arc<RateLimiter>,
}

impl UsageGuard {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Spends one unit of `action` quota, or explains why it can't.
    pub fn consume(
        &self,
        user_id: &str,
        tier: Tier,
        action: Action,
    ) -> Result<RateLimitDecision, AppError> {
        let policy = action.policy(tier).ok_or_else(|| {
            AppError::Forbidden(format!("{} requires a Pro subscription", action.endpoint()))
        })?;

        let key = rate_limit_key(user_id, action.endpoint());
        let decision = self.limiter.check(&key, &policy);

        if !decision.allowed {
            return Err(AppError::RateLimited {
                message: decision
                    .message
                    .unwrap_or_else(|| "Rate limit exceeded".to_string()),
                reset_time: decision.reset_time,
            });
        }

        debug!(
            key = %key,
            remaining = decision.remaining,
            "{} allowed",
            action.endpoint()
        );
        Ok(decision)
    }

    /// Current quota for display. `None` when the action isn't available to
    /// the tier.
    pub fn status(&self, user_id: &str, tier: Tier, action: Action) -> Option<UsageLine> {
        let policy = action.policy(tier)?;
        let status = self
            .limiter
            .peek(&rate_limit_key(user_id, action.endpoint()), &policy);
        Some(UsageLine {
            remaining: status.remaining,
            total: policy.max_requests,
            reset_time: status.reset_time,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageLine {
    pub remaining: u32,
    pub total: u32,
    /// Epoch millis; `0` when no window is open.
    pub reset_time: i64,
}

/// Quota overview shown on the dashboard. Document generation lines only
/// exist for Pro users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub job_search: UsageLine,
    pub resume: Option<UsageLine>,
    pub cover_letter: Option<UsageLine>,
}

impl UsageReport {
    pub fn collect(guard: &UsageGuard, user_id: &str, is_pro: bool) -> Option<Self> {
        let tier = Tier::from_pro_flag(is_pro);
        let job_search = guard.status(user_id, tier, Action::JobSearch)?;

        let (resume, cover_letter) = if is_pro {
            (
                guard.status(user_id, tier, Action::ResumeGeneration),
                guard.status(user_id, tier, Action::CoverLetterGeneration),
            )
        } else {
            (None, None)
        };

        Some(Self {
            job_search,
            resume,
            cover_letter,
        })
    }

    pub fn render(&self, now: i64) -> String {
        let mut lines = vec![render_line("Job searches", &self.job_search, now)];
        if let Some(line) = &self.resume {
            lines.push(render_line("Resume", line, now));
        }
        if let Some(line) = &self.cover_letter {
            lines.push(render_line("Cover letter", line, now));
        }
        if self.resume.is_none() && self.cover_letter.is_none() {
            lines.push("Upgrade to Pro for more searches and document generation".to_string());
        }
        lines.join("\n")
    }
}

fn render_line(label: &str, line: &UsageLine, now: i64) -> String {
    format!(
        "{label}: {}/{} (resets in {})",
        line.remaining,
        line.total,
        format_reset_in(line.reset_time, now)
    )
}

/// `"Now"`, `"{m}m"` or `"{h}h {m}m"` until `reset_time`.
pub fn format_reset_in(reset_time: i64, now: i64) -> String {
    if reset_time <= now {
        return "Now".to_string();
    }

    let minutes = (reset_time - now) / 60_000;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else {
        format!("{minutes}m")
    }
}
