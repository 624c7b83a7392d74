//! Provider catalogue and the current provider/model selection.

use super::Transition;
use crate::services::providers::Provider;
use crate::services::ProviderService;
use tracing::error;

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "llama3.1:8b-instruct-q8_0";

#[derive(Debug, Clone, PartialEq)]
pub struct ProvidersState {
    pub providers: Vec<Provider>,
    pub current_provider: String,
    pub current_model: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for ProvidersState {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            current_provider: DEFAULT_PROVIDER.to_string(),
            current_model: DEFAULT_MODEL.to_string(),
            is_loading: false,
            error: None,
        }
    }
}

/// One entry of a model picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub label: String,
    /// `provider:model`
    pub value: String,
    pub provider: String,
}

impl ProvidersState {
    pub fn active_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|provider| provider.is_active)
    }

    pub fn default_provider(&self) -> Option<&Provider> {
        self.providers.iter().find(|provider| provider.is_default)
    }

    pub fn selected_provider(&self) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|provider| provider.name == self.current_provider)
    }

    /// Models of the selected provider.
    pub fn available_models(&self) -> Vec<ModelOption> {
        let Some(provider) = self.selected_provider() else {
            return Vec::new();
        };
        provider
            .models
            .iter()
            .map(|model| ModelOption {
                label: model.label().to_string(),
                value: format!("{}:{}", provider.name, model.model_name),
                provider: provider.name.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvidersAction {
    LoadStarted,
    Loaded(Vec<Provider>),
    LoadFailed,
    /// Selects a provider and its first model, if it has any.
    SetProvider(String),
    SetModel(String),
}

pub fn apply(state: ProvidersState, action: ProvidersAction) -> Transition<ProvidersState> {
    let mut state = state;
    match action {
        ProvidersAction::LoadStarted => {
            state.is_loading = true;
            state.error = None;
        }
        ProvidersAction::Loaded(providers) => {
            state.providers = providers;
            state.is_loading = false;
        }
        ProvidersAction::LoadFailed => {
            state.error = Some("Failed to load providers".to_string());
            state.is_loading = false;
        }
        ProvidersAction::SetProvider(name) => {
            let first_model = state
                .providers
                .iter()
                .find(|provider| provider.name == name)
                .and_then(|provider| provider.models.first())
                .map(|model| model.model_name.clone());
            if let Some(model) = first_model {
                state.current_model = model;
            }
            state.current_provider = name;
        }
        ProvidersAction::SetModel(model) => state.current_model = model,
    }
    Transition::new(state)
}

/// Fetches the catalogue unless it is already loaded.
pub async fn load_providers(
    state: ProvidersState,
    service: &ProviderService,
) -> Transition<ProvidersState> {
    if !state.providers.is_empty() {
        return Transition::new(state);
    }

    let started = apply(state, ProvidersAction::LoadStarted);
    let outcome = match service.get_providers().await {
        Ok(response) => ProvidersAction::Loaded(response.providers),
        Err(err) => {
            error!(error = %err, "Load providers error");
            ProvidersAction::LoadFailed
        }
    };
    started.and_then(|state| apply(state, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::utils::test_utils::{MockResponse, MockServer};
    use serde_json::json;
    use std::sync::Arc;

    fn catalogue() -> serde_json::Value {
        json!({
            "providers": [
                {"name": "ollama", "is_active": true, "models": [{"model_name": "llama3"}, {"model_name": "mistral", "display_name": "Mistral 7B"}]},
                {"name": "openai", "is_active": false, "is_default": true, "models": []}
            ],
            "total": 2,
            "enabled_count": 1
        })
    }

    #[test]
    fn selecting_a_provider_picks_its_first_model() {
        let providers: Vec<Provider> =
            serde_json::from_value(catalogue()["providers"].clone()).unwrap();
        let state = apply(ProvidersState::default(), ProvidersAction::Loaded(providers)).state;

        let state = apply(state, ProvidersAction::SetProvider("ollama".to_string())).state;
        assert_eq!(state.current_model, "llama3");

        let options = state.available_models();
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].label, "Mistral 7B");
        assert_eq!(options[1].value, "ollama:mistral");

        // A provider without models keeps the current model.
        let state = apply(state, ProvidersAction::SetProvider("openai".to_string())).state;
        assert_eq!(state.current_provider, "openai");
        assert_eq!(state.current_model, "llama3");
        assert!(state.available_models().is_empty());

        assert_eq!(state.active_providers().count(), 1);
        assert_eq!(state.default_provider().unwrap().name, "openai");
    }

    #[tokio::test]
    async fn providers_load_once() {
        let server = MockServer::one(MockResponse::json(200, catalogue())).await;
        let client = Arc::new(ApiClient::new(&server.config()).unwrap());
        let service = ProviderService::new(client);

        let loaded = load_providers(ProvidersState::default(), &service).await.state;
        assert_eq!(loaded.providers.len(), 2);
        assert!(!loaded.is_loading);

        let again = load_providers(loaded, &service).await.state;
        assert_eq!(again.providers.len(), 2);
        assert_eq!(server.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_load_sets_error() {
        let server = MockServer::one(MockResponse::json(500, json!({}))).await;
        let client = Arc::new(ApiClient::new(&server.config()).unwrap());
        let service = ProviderService::new(client);

        let state = load_providers(ProvidersState::default(), &service).await.state;
        assert_eq!(state.error.as_deref(), Some("Failed to load providers"));
        assert!(state.providers.is_empty());
        assert!(!state.is_loading);
    }
}
