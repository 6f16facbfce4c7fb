//! Configuration module for the targeting console.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend API
    pub base_url: String,
    /// Access token sent on every backend request (optional in dev)
    pub api_token: Option<String>,
    /// Page size for version-history pagination
    pub version_page_size: usize,
    /// Debounce delay for backend uniqueness checks
    pub debounce: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let base_url = env::var("TC_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4000/api".to_string());

        let api_token = env::var("TC_API_TOKEN").ok();

        let version_page_size = env::var("TC_VERSION_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let debounce_ms = env::var("TC_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(400);

        let log_level = env::var("TC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            base_url,
            api_token,
            version_page_size,
            debounce: Duration::from_millis(debounce_ms),
            log_level,
        }
    }
}
