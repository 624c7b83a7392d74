//! Model choice across providers, and provider configuration checks.

use crate::api::ServiceError;
use crate::services::providers::{HealthState, Model, Provider, ProviderHealth};
use crate::services::ProviderService;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const SENSITIVE_CONFIG_KEYS: [&str; 3] = ["api_key", "secret_key", "password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UseCase {
    #[default]
    Chat,
    Code,
    Analysis,
    Creative,
}

impl UseCase {
    fn preferred_models(self) -> &'static [&'static str] {
        match self {
            UseCase::Chat => &["gpt-4o", "claude-3.5-sonnet", "gemini-2.5-flash"],
            UseCase::Code => &["gpt-4o", "claude-3.5-sonnet", "deepseek-coder"],
            UseCase::Analysis => &["claude-3.5-sonnet", "gpt-4o", "gemini-2.5-flash"],
            UseCase::Creative => &["claude-3.5-sonnet", "gpt-4o", "llama3.1:70b"],
        }
    }
}

impl FromStr for UseCase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "chat" => Ok(UseCase::Chat),
            "code" => Ok(UseCase::Code),
            "analysis" => Ok(UseCase::Analysis),
            "creative" => Ok(UseCase::Creative),
            other => Err(format!(
                "Unknown use case: {other} (expected chat, code, analysis or creative)"
            )),
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UseCase::Chat => "chat",
            UseCase::Code => "code",
            UseCase::Analysis => "analysis",
            UseCase::Creative => "creative",
        };
        f.write_str(name)
    }
}

/// `provider:model`, split at the first colon so model tags survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn parse(value: &str) -> Option<Self> {
        let (provider, model) = value.split_once(':')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailableModel {
    pub model: Model,
    pub provider: String,
    /// The provider's last health check was healthy.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub model: Model,
    /// `provider:model`
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    pub provider: String,
    pub provider_name: String,
    pub healthy: bool,
    pub models: Vec<ModelChoice>,
}

/// Catalogue of active providers' models annotated with provider health.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    service: Arc<ProviderService>,
    providers: Vec<Provider>,
    health: HashMap<String, ProviderHealth>,
}

impl ModelSelector {
    pub fn new(service: Arc<ProviderService>) -> Self {
        Self {
            service,
            providers: Vec::new(),
            health: HashMap::new(),
        }
    }

    /// Fetches the provider list and every provider's health concurrently.
    pub async fn initialize(&mut self) -> Result<(), ServiceError> {
        let (providers, health) = tokio::try_join!(
            self.service.get_providers(),
            self.service.check_all_providers_health()
        )?;
        self.replace_catalogue(providers.providers, health);
        Ok(())
    }

    pub fn replace_catalogue(&mut self, providers: Vec<Provider>, health: Vec<ProviderHealth>) {
        self.providers = providers;
        self.health = health
            .into_iter()
            .map(|check| (check.provider.clone(), check))
            .collect();
    }

    fn is_healthy(&self, provider: &str) -> bool {
        self.health
            .get(provider)
            .is_some_and(|check| check.status == HealthState::Healthy)
    }

    fn active_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|provider| provider.is_active)
    }

    pub fn all_models(&self) -> Vec<AvailableModel> {
        self.active_providers()
            .flat_map(|provider| {
                let available = self.is_healthy(&provider.name);
                provider.models.iter().map(move |model| AvailableModel {
                    model: model.clone(),
                    provider: provider.name.clone(),
                    available,
                })
            })
            .collect()
    }

    pub fn grouped_models(&self) -> Vec<ModelGroup> {
        self.active_providers()
            .map(|provider| ModelGroup {
                provider: provider.name.clone(),
                provider_name: provider.label().to_string(),
                healthy: self.is_healthy(&provider.name),
                models: provider
                    .models
                    .iter()
                    .map(|model| ModelChoice {
                        model: model.clone(),
                        value: format!("{}:{}", provider.name, model.model_name),
                        label: model.label().to_string(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// First available model matching the use case's preferences, else the
    /// first available model at all.
    pub fn recommended_model(&self, use_case: UseCase) -> Option<ModelRef> {
        let available: Vec<_> = self
            .all_models()
            .into_iter()
            .filter(|entry| entry.available)
            .collect();

        use_case
            .preferred_models()
            .iter()
            .find_map(|preferred| {
                available.iter().find(|entry| {
                    entry.model.model_name.contains(preferred)
                        || entry.model.display_name.contains(preferred)
                })
            })
            .or_else(|| available.first())
            .map(|entry| ModelRef {
                provider: entry.provider.clone(),
                model: entry.model.model_name.clone(),
            })
    }

    pub fn model_info(&self, provider: &str, model: &str) -> Option<&Model> {
        self.providers
            .iter()
            .find(|candidate| candidate.name == provider)?
            .models
            .iter()
            .find(|candidate| candidate.model_name == model)
    }

    /// Healthy, active, and offering the model.
    pub fn is_model_available(&self, provider: &str, model: &str) -> bool {
        if !self.is_healthy(provider) {
            return false;
        }
        self.providers
            .iter()
            .find(|candidate| candidate.name == provider)
            .is_some_and(|candidate| {
                candidate.is_active
                    && candidate
                        .models
                        .iter()
                        .any(|entry| entry.model_name == model)
            })
    }
}

/// Reads and validates provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfigManager {
    service: Arc<ProviderService>,
}

impl ProviderConfigManager {
    pub fn new(service: Arc<ProviderService>) -> Self {
        Self { service }
    }

    /// Provider configuration with credentials removed.
    pub async fn safe_config(&self, provider: &str) -> Result<Map<String, Value>, ServiceError> {
        let config = self.service.get_provider_config(provider).await?;
        Ok(redact_config(config))
    }

    /// Validates `config` and saves it; invalid input never reaches the backend.
    pub async fn save_config(
        &self,
        provider: &str,
        config: &Map<String, Value>,
    ) -> Result<bool, ServiceError> {
        let errors = validate_config(provider, config);
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors.join("; ")));
        }
        self.service.update_provider_config(provider, config).await
    }
}

pub fn redact_config(mut config: Map<String, Value>) -> Map<String, Value> {
    for key in SENSITIVE_CONFIG_KEYS {
        config.remove(key);
    }
    config
}

/// Problems with `config` for `provider`; empty when valid.
///
/// Providers without rules always validate.
pub fn validate_config(provider: &str, config: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();
    match provider {
        "openai" => {
            if is_blank(config.get("api_key")) {
                errors.push("OpenAI API key is required".to_string());
            }
            if let Some(temperature) = config.get("temperature").and_then(Value::as_f64) {
                if !(0.0..=2.0).contains(&temperature) {
                    errors.push("Temperature must be between 0 and 2".to_string());
                }
            }
        }
        "anthropic" => {
            if is_blank(config.get("api_key")) {
                errors.push("Anthropic API key is required".to_string());
            }
            if let Some(max_tokens) = config.get("max_tokens").and_then(Value::as_f64) {
                if max_tokens < 1.0 {
                    errors.push("Max tokens must be greater than 0".to_string());
                }
            }
        }
        "google" => {
            if is_blank(config.get("api_key")) {
                errors.push("Google API key is required".to_string());
            }
        }
        "ollama" => {
            if is_blank(config.get("base_url")) {
                errors.push("Ollama base URL is required".to_string());
            }
        }
        _ => {}
    }
    errors
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::utils::test_utils::{MockResponse, MockServer};
    use serde_json::json;

    fn catalogue() -> Value {
        json!({
            "providers": [
                {"name": "openai", "display_name": "OpenAI", "is_active": true, "models": [
                    {"model_name": "gpt-3.5-turbo", "display_name": "GPT-3.5"},
                    {"model_name": "gpt-4o", "display_name": "GPT-4o"}
                ]},
                {"name": "ollama", "is_active": true, "models": [{"model_name": "llama3.1:70b"}]},
                {"name": "google", "is_active": false, "models": [{"model_name": "gemini-2.5-flash"}]}
            ],
            "total": 3,
            "enabled_count": 2,
            "health_checks": [
                {"provider": "openai", "status": "healthy", "last_check": "2024-05-01T10:00:00Z"},
                {"provider": "ollama", "status": "unhealthy", "last_check": "2024-05-01T10:00:00Z"},
                {"provider": "google", "status": "healthy", "last_check": "2024-05-01T10:00:00Z"}
            ]
        })
    }

    fn service(server: &MockServer) -> Arc<ProviderService> {
        Arc::new(ProviderService::new(Arc::new(
            ApiClient::new(&server.config()).unwrap(),
        )))
    }

    async fn selector() -> (ModelSelector, MockServer) {
        // Both endpoints decode their own fields from the same body.
        let server = MockServer::one(MockResponse::json(200, catalogue())).await;
        let mut selector = ModelSelector::new(service(&server));
        selector.initialize().await.unwrap();
        (selector, server)
    }

    #[tokio::test]
    async fn initialize_fetches_catalogue_and_health() {
        let (selector, server) = selector().await;
        let mut paths: Vec<_> = server
            .requests()
            .await
            .iter()
            .map(|request| request.path().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/providers", "/providers/health"]);

        let models = selector.all_models();
        assert_eq!(models.len(), 3);
        assert!(models.iter().all(|entry| entry.provider != "google"));
        assert!(models[0].available);
        assert!(!models[2].available);

        let groups = selector.grouped_models();
        assert_eq!(groups[0].provider_name, "OpenAI");
        assert_eq!(groups[0].models[1].value, "openai:gpt-4o");
        assert_eq!(groups[1].provider_name, "ollama");
        assert_eq!(groups[1].models[0].label, "llama3.1:70b");
        assert!(!groups[1].healthy);
    }

    #[tokio::test]
    async fn recommendations_skip_unhealthy_providers() {
        let (selector, _server) = selector().await;

        let pick = selector.recommended_model(UseCase::Creative).unwrap();
        assert_eq!(pick.to_string(), "openai:gpt-4o");

        let pick = selector.recommended_model(UseCase::Code).unwrap();
        assert_eq!(pick.model, "gpt-4o");

        assert!(selector.is_model_available("openai", "gpt-4o"));
        assert!(!selector.is_model_available("ollama", "llama3.1:70b"));
        assert!(!selector.is_model_available("google", "gemini-2.5-flash"));
        assert_eq!(
            selector.model_info("openai", "gpt-3.5-turbo").unwrap().label(),
            "GPT-3.5"
        );
        assert!(selector.model_info("openai", "missing").is_none());
    }

    #[test]
    fn recommendation_falls_back_to_first_available() {
        let providers: Vec<Provider> = serde_json::from_value(json!([
            {"name": "ollama", "is_active": true, "models": [{"model_name": "phi3"}]}
        ]))
        .unwrap();
        let health: Vec<ProviderHealth> = serde_json::from_value(json!([
            {"provider": "ollama", "status": "healthy", "last_check": "2024-05-01T10:00:00Z"}
        ]))
        .unwrap();

        let config = crate::api::ServiceConfig::new("http://localhost:8000").unwrap();
        let service = ProviderService::new(Arc::new(ApiClient::new(&config).unwrap()));
        let mut selector = ModelSelector::new(Arc::new(service));
        assert_eq!(selector.recommended_model(UseCase::Chat), None);

        selector.replace_catalogue(providers, health);
        assert_eq!(
            selector.recommended_model(UseCase::Chat),
            ModelRef::parse("ollama:phi3")
        );
    }

    #[test]
    fn model_strings_split_at_the_first_colon() {
        let parsed = ModelRef::parse("ollama:llama3.1:8b-instruct-q8_0").unwrap();
        assert_eq!(parsed.provider, "ollama");
        assert_eq!(parsed.model, "llama3.1:8b-instruct-q8_0");
        assert_eq!(ModelRef::parse("gpt-4o"), None);
        assert_eq!(ModelRef::parse(":gpt-4o"), None);
        assert_eq!("code".parse::<UseCase>().unwrap(), UseCase::Code);
        assert!("poetry".parse::<UseCase>().is_err());
    }

    #[test]
    fn validation_rules_per_provider() {
        let config = |value: Value| value.as_object().cloned().unwrap();

        assert_eq!(
            validate_config("openai", &config(json!({"temperature": 3}))),
            vec![
                "OpenAI API key is required".to_string(),
                "Temperature must be between 0 and 2".to_string()
            ]
        );
        assert!(
            validate_config("openai", &config(json!({"api_key": "sk", "temperature": 1.5})))
                .is_empty()
        );
        assert_eq!(
            validate_config("anthropic", &config(json!({"api_key": "k", "max_tokens": 0}))),
            vec!["Max tokens must be greater than 0".to_string()]
        );
        assert_eq!(
            validate_config("google", &config(json!({"api_key": ""}))),
            vec!["Google API key is required".to_string()]
        );
        assert_eq!(
            validate_config("ollama", &config(json!({}))),
            vec!["Ollama base URL is required".to_string()]
        );
        assert!(validate_config("bedrock", &config(json!({}))).is_empty());
    }

    #[tokio::test]
    async fn safe_config_strips_credentials() {
        let server = MockServer::one(MockResponse::json(
            200,
            json!({"config": {"api_key": "sk", "secret_key": "s", "password": "p", "base_url": "http://x"}}),
        ))
        .await;
        let manager = ProviderConfigManager::new(service(&server));

        let config = manager.safe_config("openai").await.unwrap();
        assert_eq!(Value::Object(config), json!({"base_url": "http://x"}));
        assert_eq!(server.last_request().await.path(), "/providers/openai/config");
    }

    #[tokio::test]
    async fn invalid_config_is_not_sent() {
        let server = MockServer::one(MockResponse::json(200, json!({"success": true}))).await;
        let manager = ProviderConfigManager::new(service(&server));

        let err = manager
            .save_config("ollama", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(server.requests().await.is_empty());

        let mut config = Map::new();
        config.insert("base_url".to_string(), json!("http://localhost:11434"));
        assert!(manager.save_config("ollama", &config).await.unwrap());
    }
}
