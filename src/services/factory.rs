//! Service locator: one shared transport client and lazily built services.

use crate::api::{ApiClient, RetryPolicy, ServiceConfig, ServiceError};
use crate::services::chat::SEND_BASE_DELAY;
use crate::services::{ChatService, McpService, ProviderService, SystemPromptService};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Owns the shared [`ApiClient`] and one instance of each domain service.
///
/// Every service holds the same client, so rotating the API key here affects
/// all of them at once.
#[derive(Debug)]
pub struct ServiceFactory {
    config: ServiceConfig,
    client: Arc<ApiClient>,
    chat: OnceLock<Arc<ChatService>>,
    providers: OnceLock<Arc<ProviderService>>,
    mcp: OnceLock<Arc<McpService>>,
    system_prompts: OnceLock<Arc<SystemPromptService>>,
}

impl ServiceFactory {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = ApiClient::new(&config)?;
        debug!(base_url = %config.base_url(), "Service factory created");

        Ok(Self {
            config,
            client: Arc::new(client),
            chat: OnceLock::new(),
            providers: OnceLock::new(),
            mcp: OnceLock::new(),
            system_prompts: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn api_client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }

    pub fn set_api_key(&self, api_key: &str) {
        self.client.set_api_key(api_key);
    }

    pub fn clear_api_key(&self) {
        self.client.clear_api_key();
    }

    /// Chat sends retry `retry_attempts` times from the configuration.
    pub fn chat_service(&self) -> Arc<ChatService> {
        Arc::clone(self.chat.get_or_init(|| {
            let policy = RetryPolicy::new(self.config.retry_attempts(), SEND_BASE_DELAY);
            Arc::new(ChatService::new(self.api_client()).with_send_policy(policy))
        }))
    }

    pub fn provider_service(&self) -> Arc<ProviderService> {
        Arc::clone(
            self.providers
                .get_or_init(|| Arc::new(ProviderService::new(self.api_client()))),
        )
    }

    pub fn mcp_service(&self) -> Arc<McpService> {
        Arc::clone(
            self.mcp
                .get_or_init(|| Arc::new(McpService::new(self.api_client()))),
        )
    }

    pub fn system_prompt_service(&self) -> Arc<SystemPromptService> {
        Arc::clone(
            self.system_prompts
                .get_or_init(|| Arc::new(SystemPromptService::new(self.api_client()))),
        )
    }

    /// `true` when `GET /health` succeeds; failures are logged, never raised.
    pub async fn test_connection(&self) -> bool {
        match self.client.health().await {
            Ok(response) => response.success,
            Err(err) => {
                warn!(status = err.status, error = %err, "Connection test failed");
                false
            }
        }
    }
}

/// Caller-owned holder of the shared [`ServiceFactory`].
///
/// The first access must supply a configuration; later accesses return the
/// same factory and ignore whatever configuration they pass.
#[derive(Debug, Default)]
pub struct ServiceLocator {
    instance: Mutex<Option<Arc<ServiceFactory>>>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_instance(&self, config: Option<ServiceConfig>) -> Result<Arc<ServiceFactory>, ServiceError> {
        let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(factory) = slot.as_ref() {
            return Ok(Arc::clone(factory));
        }

        let config = config.ok_or(ServiceError::ConfigurationRequired)?;
        let factory = Arc::new(ServiceFactory::new(config)?);
        *slot = Some(Arc::clone(&factory));
        Ok(factory)
    }

    pub fn is_initialized(&self) -> bool {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drops the cached factory; the next access needs a configuration again.
    pub fn reset(&self) {
        *self.instance.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
