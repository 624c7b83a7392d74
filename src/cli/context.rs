//! Everything a command needs: configuration, persisted state and services.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::api::{ServiceConfig, ServiceError};
use crate::core::config::{BaseUrlSource, Config};
use crate::core::keyring::{CredentialStore, KeyringCredentialStore};
use crate::core::state::chat::{self, ChatAction, ChatState, LocalConversation};
use crate::core::state::settings::{self, SettingsAction, SettingsState};
use crate::core::state::{EffectDriver, NoticeLevel, Transition};
use crate::core::storage::{
    load_json, FileStore, KeyValueStore, KEY_BACKEND_URL, KEY_CONVERSATIONS,
    KEY_PLATFORM_SETTINGS,
};
use crate::services::{ServiceFactory, ServiceMetricsCollector};

pub struct CliContext {
    pub config: Config,
    pub factory: Arc<ServiceFactory>,
    pub driver: EffectDriver,
    pub settings: SettingsState,
    pub base_url_source: BaseUrlSource,
    metrics: ServiceMetricsCollector,
}

impl CliContext {
    /// Loads the config file, the on-disk state and the stored API key.
    pub fn load(api_url: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(FileStore::default_path()?));
        let credentials: Arc<dyn CredentialStore> = Arc::new(
            KeyringCredentialStore::new_with_keyring(config.keyring_enabled()),
        );
        Self::from_parts(config, api_url, store, credentials)
    }

    pub fn from_parts(
        config: Config,
        api_url: Option<&str>,
        store: Arc<dyn KeyValueStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, Box<dyn Error>> {
        let persisted_url = store.get(KEY_BACKEND_URL)?;
        let settings = settings::apply(
            SettingsState::default(),
            SettingsAction::Hydrate {
                backend_url: persisted_url.clone(),
                platform: load_json(store.as_ref(), KEY_PLATFORM_SETTINGS)?,
            },
            chrono::Utc::now(),
        )
        .state;

        let (service_settings, base_url_source) =
            config.resolve_service_settings(api_url, persisted_url.as_deref());
        let api_key = match credentials.get_api_key() {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "Could not read the stored API key");
                None
            }
        };
        let service_config = ServiceConfig::try_from(service_settings)?.with_api_key(api_key);
        debug!(
            base_url = %service_config.base_url(),
            source = ?base_url_source,
            "Resolved backend"
        );

        let factory = Arc::new(ServiceFactory::new(service_config)?);
        let driver = EffectDriver::new(store, credentials).with_factory(Arc::clone(&factory));

        Ok(Self {
            config,
            factory,
            driver,
            settings,
            base_url_source,
            metrics: ServiceMetricsCollector::new(),
        })
    }

    /// Local conversations, honouring the saved history preferences.
    pub fn chat_state(&self) -> Result<ChatState, Box<dyn Error>> {
        let now = chrono::Utc::now();
        let conversations: Vec<LocalConversation> =
            load_json(self.driver.store(), KEY_CONVERSATIONS)?.unwrap_or_default();
        let configured = chat::apply(
            ChatState::default(),
            ChatAction::ConfigureHistory {
                save_history: self.settings.platform.save_history,
                max_history_length: self.settings.platform.max_history_length,
            },
            now,
        );
        Ok(configured
            .and_then(|state| chat::apply(state, ChatAction::Hydrate(conversations), now))
            .state)
    }

    /// Runs the transition's effects and prints the notices they raised.
    pub fn commit<S>(&mut self, transition: Transition<S>) -> Result<S, Box<dyn Error>> {
        let state = self.driver.apply(transition)?;
        self.print_notices();
        Ok(state)
    }

    pub fn update_settings(&mut self, action: SettingsAction) -> Result<(), Box<dyn Error>> {
        let transition = settings::apply(self.settings.clone(), action, chrono::Utc::now());
        self.settings = self.commit(transition)?;
        Ok(())
    }

    pub fn print_notices(&mut self) {
        for notice in self.driver.take_notices() {
            match notice.level {
                NoticeLevel::Success => println!("✅ {}: {}", notice.title, notice.description),
                NoticeLevel::Info => println!("ℹ️  {}: {}", notice.title, notice.description),
                NoticeLevel::Warning => {
                    eprintln!("⚠️  {}: {}", notice.title, notice.description)
                }
                NoticeLevel::Error => eprintln!("❌ {}: {}", notice.title, notice.description),
            }
        }
    }

    /// Awaits `call` and records its outcome under `service`.
    pub async fn track<T, F>(&self, service: &str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let started = Instant::now();
        let result = call.await;
        self.metrics
            .record_call(service, result.is_ok(), started.elapsed());
        result
    }

    pub fn log_metrics(&self) {
        for (service, metrics) in self.metrics.all_metrics() {
            debug!(
                service = %service,
                calls = metrics.calls,
                errors = metrics.errors,
                average_ms = metrics.average_time_ms,
                "Service calls"
            );
        }
    }

    pub fn metrics(&self) -> &ServiceMetricsCollector {
        &self.metrics
    }
}
