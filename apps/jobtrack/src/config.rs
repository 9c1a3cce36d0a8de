use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration loaded from environment variables.
/// Backend URLs are optional; commands that need a missing one fail with
/// `AppError::NotConfigured`.
#[derive(Debug, Clone)]
pub struct Config {
    pub search_api_url: Option<String>,
    pub get_user_url: Option<String>,
    pub save_user_url: Option<String>,
    pub store_path: PathBuf,
    pub cleanup_interval: Duration,
    pub save_debounce: Duration,
    pub http_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            search_api_url: optional_env("JOBTRACK_SEARCH_API_URL"),
            get_user_url: optional_env("JOBTRACK_GET_USER_URL"),
            save_user_url: optional_env("JOBTRACK_SAVE_USER_URL"),
            store_path: optional_env("JOBTRACK_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".jobtrack/store.json")),
            cleanup_interval: Duration::from_secs(parse_env(
                "JOBTRACK_CLEANUP_INTERVAL_SECS",
                300,
            )?),
            save_debounce: Duration::from_millis(parse_env("JOBTRACK_SAVE_DEBOUNCE_MS", 1000)?),
            http_timeout: Duration::from_secs(parse_env("JOBTRACK_HTTP_TIMEOUT_SECS", 30)?),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search_api_url: None,
            get_user_url: None,
            save_user_url: None,
            store_path: PathBuf::from(".jobtrack/store.json"),
            cleanup_interval: Duration::from_secs(300),
            save_debounce: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(30),
            rust_log: "info".to_string(),
        }
    }
}

/// Unset and blank values both count as missing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.save_debounce, Duration::from_secs(1));
        assert!(config.search_api_url.is_none());
    }

    #[test]
    fn test_parse_env_reports_bad_value() {
        std::env::set_var("JOBTRACK_TEST_BAD_NUMBER", "five");
        let err = parse_env::<u64>("JOBTRACK_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("JOBTRACK_TEST_BAD_NUMBER"));
        std::env::remove_var("JOBTRACK_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_blank_env_is_missing() {
        std::env::set_var("JOBTRACK_TEST_BLANK", "   ");
        assert!(optional_env("JOBTRACK_TEST_BLANK").is_none());
        assert_eq!(parse_env::<u64>("JOBTRACK_TEST_BLANK", 7).unwrap(), 7);
        std::env::remove_var("JOBTRACK_TEST_BLANK");
    }
}
