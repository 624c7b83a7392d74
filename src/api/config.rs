//! Connection settings for the backend and their validation.

use crate::utils::url::normalize_base_url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_RETRY_ATTEMPTS: i64 = 2;
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8000";
pub const PRODUCTION_BASE_URL: &str = "https://api.makeitrealconsulting.com";

/// Unvalidated connection settings as they arrive from the config file,
/// environment or command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<i64>,
}

impl ServiceSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Local backend with generous timeouts.
    pub fn development() -> Self {
        Self {
            base_url: DEVELOPMENT_BASE_URL.to_string(),
            api_key: None,
            timeout_ms: Some(30_000),
            retry_attempts: Some(2),
        }
    }

    pub fn production() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            api_key: None,
            timeout_ms: Some(15_000),
            retry_attempts: Some(3),
        }
    }

    /// Looks up a named preset (`development`/`dev`, `production`/`prod`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::development()),
            "production" | "prod" => Some(Self::production()),
            _ => None,
        }
    }

    /// Returns every problem with these settings; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push("Base URL is required".to_string());
        } else if reqwest::Url::parse(self.base_url.trim()).is_err() {
            errors.push("Base URL must be a valid URL".to_string());
        }

        if self.timeout_ms.is_some_and(|timeout| timeout <= 0) {
            errors.push("Timeout must be greater than 0".to_string());
        }

        if self.retry_attempts.is_some_and(|attempts| attempts < 0) {
            errors.push("Retry attempts must be 0 or greater".to_string());
        }

        errors
    }
}

/// Settings rejected by [`ServiceSettings::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub errors: Vec<String>,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid service configuration: {}", self.errors.join("; "))
    }
}

impl std::error::Error for ConfigValidationError {}

/// Validated connection configuration.
///
/// The base URL never ends in `/`, the timeout is positive and the retry
/// count is non-negative. Fields are fixed once constructed; the API key can
/// only be rotated on the transport client built from this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry_attempts: u32,
}

impl ServiceConfig {
    /// Validates `base_url` and applies default timeout and retry values.
    pub fn new(base_url: &str) -> Result<Self, ConfigValidationError> {
        Self::try_from(ServiceSettings::new(base_url))
    }

    /// Same configuration with a different initial API key.
    pub fn with_api_key(self, api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            ..self
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }
}

impl TryFrom<ServiceSettings> for ServiceConfig {
    type Error = ConfigValidationError;

    fn try_from(settings: ServiceSettings) -> Result<Self, Self::Error> {
        let errors = settings.validate();
        if !errors.is_empty() {
            return Err(ConfigValidationError { errors });
        }

        let timeout_ms = settings.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let retry_attempts = settings.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS);

        Ok(Self {
            base_url: normalize_base_url(settings.base_url.trim()),
            api_key: settings.api_key.filter(|key| !key.is_empty()),
            timeout: Duration::from_millis(timeout_ms.unsigned_abs()),
            retry_attempts: u32::try_from(retry_attempts).unwrap_or(u32::MAX),
        })
    }
}
