use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by the orchestration services.
///
/// Limiter and cache operations never fail; only the service layer turns a
/// denied check or a backend problem into an error for the caller to show.
#[derive(Debug, Error)]
pub enum AppError {
    /// The user hit a usage limit. `message` is meant for display.
    #[error("{message}")]
    RateLimited { message: String, reset_time: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl AppError {
    /// Stable machine-readable code, e.g. for CLI exit reporting.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotConfigured(_) => "NOT_CONFIGURED",
            AppError::Backend(_) => "BACKEND_ERROR",
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }
}
