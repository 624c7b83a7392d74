use crate::api::config::ServiceSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the backend base URL.
pub const API_URL_ENV_VAR: &str = "LLMDESK_API_URL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Backend base URL (e.g., "http://localhost:8000")
    pub base_url: Option<String>,
    /// Preset used when no base URL is configured anywhere ("development" or "production")
    pub environment: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: Option<i64>,
    pub retry_attempts: Option<i64>,
    pub default_provider: Option<String>,
    /// Preferred model per provider
    #[serde(default)]
    pub default_models: HashMap<String, String>,
    /// Store the API key in the OS keyring (default: true)
    pub use_keyring: Option<bool>,
}

/// Where the effective base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrlSource {
    Override,
    ConfigFile,
    Persisted,
    Preset,
}

impl Config {
    pub fn keyring_enabled(&self) -> bool {
        self.use_keyring.unwrap_or(true)
    }

    pub fn set_default_model(&mut self, provider: &str, model: &str) {
        self.default_models
            .insert(provider.to_string(), model.to_string());
    }

    pub fn default_model_for(&self, provider: &str) -> Option<&str> {
        self.default_models.get(provider).map(String::as_str)
    }

    /// Preset settings named by `environment`, falling back to development.
    pub fn preset(&self) -> ServiceSettings {
        self.environment
            .as_deref()
            .and_then(ServiceSettings::preset)
            .unwrap_or_else(ServiceSettings::development)
    }

    /// Resolves connection settings.
    ///
    /// The base URL comes from the first of: `override_url` (flag or
    /// environment), this file, the URL persisted by the settings state, the
    /// preset. Timeout and retry values from this file replace the preset's.
    pub fn resolve_service_settings(
        &self,
        override_url: Option<&str>,
        persisted_url: Option<&str>,
    ) -> (ServiceSettings, BaseUrlSource) {
        let mut settings = self.preset();
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        let (base_url, source) = if let Some(url) = non_empty(override_url) {
            (url.to_string(), BaseUrlSource::Override)
        } else if let Some(url) = non_empty(self.base_url.as_deref()) {
            (url.to_string(), BaseUrlSource::ConfigFile)
        } else if let Some(url) = non_empty(persisted_url) {
            (url.to_string(), BaseUrlSource::Persisted)
        } else {
            (settings.base_url.clone(), BaseUrlSource::Preset)
        };

        settings.base_url = base_url;
        if self.timeout_ms.is_some() {
            settings.timeout_ms = self.timeout_ms;
        }
        if self.retry_attempts.is_some() {
            settings.retry_attempts = self.retry_attempts;
        }
        (settings, source)
    }
}

/// Formats a path for display, abbreviating the home directory as `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
