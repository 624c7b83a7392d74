//! Provider and model catalogue endpoints.

use crate::api::{ApiClient, ErrorHandler, ServiceError};
use crate::services::SuccessResponse;
use crate::utils::time::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub model_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_window: u64,
    #[serde(default)]
    pub max_tokens: u64,
    #[serde(default)]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_functions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_token: Option<ModelCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Model {
    /// Display name, falling back to the model id.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.model_name
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub requires_api_key: bool,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Provider {
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub status: HealthState,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(with = "iso_timestamp")]
    pub last_check: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProvidersListResponse {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub enabled_count: u64,
    #[serde(default)]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelsListResponse {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderTestResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct HealthChecksEnvelope {
    #[serde(default)]
    health_checks: Vec<ProviderHealth>,
}

#[derive(Deserialize)]
struct ConfigEnvelope {
    #[serde(default)]
    config: Map<String, Value>,
}

pub const DEFAULT_TEST_MESSAGE: &str = "Hello, world!";

#[derive(Debug, Clone)]
pub struct ProviderService {
    client: Arc<ApiClient>,
}

impl ProviderService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_providers(&self) -> Result<ProvidersListResponse, ServiceError> {
        let response = self
            .client
            .get::<ProvidersListResponse>("/providers")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to fetch providers"))?;
        Ok(response.data)
    }

    pub async fn get_models(&self, provider: &str) -> Result<ModelsListResponse, ServiceError> {
        let response = self
            .client
            .get::<ModelsListResponse>(&format!("/providers/{provider}/models"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to fetch models for {provider}"))
            })?;
        Ok(response.data)
    }

    pub async fn check_provider_health(&self, provider: &str) -> Result<ProviderHealth, ServiceError> {
        let response = self
            .client
            .get::<ProviderHealth>(&format!("/providers/{provider}/health"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to check health for {provider}"))
            })?;
        Ok(response.data)
    }

    pub async fn check_all_providers_health(&self) -> Result<Vec<ProviderHealth>, ServiceError> {
        let response = self
            .client
            .get::<HealthChecksEnvelope>("/providers/health")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to check providers health"))?;
        Ok(response.data.health_checks)
    }

    pub async fn get_provider_config(&self, provider: &str) -> Result<Map<String, Value>, ServiceError> {
        let response = self
            .client
            .get::<ConfigEnvelope>(&format!("/providers/{provider}/config"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to get config for {provider}"))
            })?;
        Ok(response.data.config)
    }

    pub async fn update_provider_config(
        &self,
        provider: &str,
        config: &Map<String, Value>,
    ) -> Result<bool, ServiceError> {
        let body = serde_json::json!({ "config": config });
        let response = self
            .client
            .put::<SuccessResponse, _>(&format!("/providers/{provider}/config"), &body)
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to update config for {provider}"))
            })?;
        Ok(response.data.success)
    }

    /// `POST /providers/{name}/enable` or `/disable`.
    pub async fn toggle_provider(&self, provider: &str, enabled: bool) -> Result<bool, ServiceError> {
        let action = if enabled { "enable" } else { "disable" };
        let response = self
            .client
            .post_empty::<SuccessResponse>(&format!("/providers/{provider}/{action}"))
            .await
            .map_err(|err| ErrorHandler::handle(err, &format!("Failed to {action} {provider}")))?;
        Ok(response.data.success)
    }

    pub async fn set_default_provider(&self, provider: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .post_empty::<SuccessResponse>(&format!("/providers/{provider}/set-default"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to set {provider} as default"))
            })?;
        Ok(response.data.success)
    }

    /// Sends a probe prompt through `provider`.
    pub async fn test_provider(
        &self,
        provider: &str,
        model: Option<&str>,
        message: Option<&str>,
    ) -> Result<ProviderTestResult, ServiceError> {
        let body = serde_json::json!({
            "model": model,
            "message": message.unwrap_or(DEFAULT_TEST_MESSAGE),
        });
        let response = self
            .client
            .post::<ProviderTestResult, _>(&format!("/providers/{provider}/test"), &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, &format!("Failed to test {provider}")))?;
        Ok(response.data)
    }
}
