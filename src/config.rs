use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Categories pulled from the news API on every import run.
pub const NEWS_CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

/// Runtime configuration, read from environment variables.
///
/// Every field maps to the upper-cased variable of the same name
/// (e.g. `mongodb_uri` ← `MONGODB_URI`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Shared secret accepted in the `X-Service-Token` header.
    /// Unset means only logged-in users can trigger an import.
    #[serde(default)]
    pub service_token: Option<String>,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    #[serde(default)]
    pub cors_origin: Option<String>,
    /// News import is disabled when no key is configured.
    #[serde(default)]
    pub news_api_key: Option<String>,
    pub news_api_url: String,
    pub news_country: String,
    pub news_page_size: u32,
    /// Seconds between scheduled imports. `0` disables the timer.
    pub news_import_interval_secs: u64,
    pub news_author_username: String,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::load(None)
    }

    /// Build the configuration from an explicit variable map (useful for testing).
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, AppError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:4000")
            .and_then(|b| b.set_default("mongodb_uri", "mongodb://localhost:27017"))
            .and_then(|b| b.set_default("mongodb_database", "inkpost"))
            .and_then(|b| b.set_default("session_ttl_hours", 168))
            .and_then(|b| b.set_default("cookie_secure", false))
            .and_then(|b| b.set_default("news_api_url", "https://newsapi.org"))
            .and_then(|b| b.set_default("news_country", "us"))
            .and_then(|b| b.set_default("news_page_size", 20))
            .and_then(|b| b.set_default("news_import_interval_secs", 3600))
            .and_then(|b| b.set_default("news_author_username", "newsbot"))
            .map_err(|e| AppError::Internal(format!("Invalid config default: {e}")))?
            .add_source(config::Environment::default().try_parsing(true).source(vars))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to load config: {e}")))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.mongodb_uri.is_empty() {
            return Err(AppError::Internal("MONGODB_URI is required".into()));
        }
        if self.session_ttl_hours <= 0 {
            return Err(AppError::Internal(
                "SESSION_TTL_HOURS must be greater than 0".into(),
            ));
        }
        if self.news_page_size == 0 || self.news_page_size > 100 {
            return Err(AppError::Internal(
                "NEWS_PAGE_SIZE must be between 1 and 100".into(),
            ));
        }
        url::Url::parse(&self.news_api_url)
            .map_err(|e| AppError::Internal(format!("Invalid NEWS_API_URL: {e}")))?;
        Ok(())
    }

    /// The API key, if news import is enabled.
    pub fn news_api_key(&self) -> Option<&str> {
        self.news_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// The service token, if one is configured.
    pub fn service_token(&self) -> Option<&str> {
        self.service_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// The scheduled import period, if the timer is enabled.
    pub fn import_interval(&self) -> Option<Duration> {
        (self.news_import_interval_secs > 0)
            .then(|| Duration::from_secs(self.news_import_interval_secs))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
