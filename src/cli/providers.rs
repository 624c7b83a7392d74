use std::error::Error;

use serde_json::{Map, Value};

use crate::cli::context::CliContext;
use crate::cli::ProviderCommands;
use crate::core::model_selector::{ModelSelector, ProviderConfigManager};
use crate::core::state::providers::{
    self as providers_state, load_providers, ProvidersAction, ProvidersState,
};
use crate::core::state::settings::SettingsAction;
use crate::services::providers::{HealthState, Provider, ProviderHealth};

pub async fn run(context: &mut CliContext, command: ProviderCommands) -> Result<(), Box<dyn Error>> {
    let service = context.factory.provider_service();

    match command {
        ProviderCommands::List => {
            let providers = load(context).await?;
            if providers.providers.is_empty() {
                println!("No providers configured on the backend.");
                return Ok(());
            }
            context.update_settings(SettingsAction::EnsureDefaultProvider(
                providers.providers.clone(),
            ))?;
            let saved_default = context.settings.platform.default_provider.clone();
            println!("Providers:");
            for provider in &providers.providers {
                println!("{}", format_provider(provider, provider.name == saved_default));
            }
            Ok(())
        }
        ProviderCommands::Models { provider } => {
            let name = provider.unwrap_or_else(|| context.settings.platform.default_provider.clone());
            let providers = load(context).await?;
            let selected =
                providers_state::apply(providers, ProvidersAction::SetProvider(name.clone())).state;
            if selected.selected_provider().is_none() {
                return Err(format!("Unknown provider: {name}").into());
            }
            let configured = context.config.default_model_for(&name).map(str::to_string);
            println!("Models for {name}:");
            for option in selected.available_models() {
                let model = option.value.split_once(':').map_or("", |(_, model)| model);
                let marker = if configured.as_deref() == Some(model) { "*" } else { " " };
                println!("  {marker} {:<40} {}", model, option.label);
            }
            Ok(())
        }
        ProviderCommands::Health { provider } => {
            let checks = match provider {
                Some(name) => vec![
                    context
                        .track("provider", service.check_provider_health(&name))
                        .await?,
                ],
                None => {
                    context
                        .track("provider", service.check_all_providers_health())
                        .await?
                }
            };
            for check in &checks {
                println!("{}", format_health(check));
            }
            Ok(())
        }
        ProviderCommands::Enable { provider } => toggle(context, &provider, true).await,
        ProviderCommands::Disable { provider } => toggle(context, &provider, false).await,
        ProviderCommands::SetDefault { provider } => {
            if context
                .track("provider", service.set_default_provider(&provider))
                .await?
            {
                println!("✅ {provider} is now the default provider");
                Ok(())
            } else {
                Err(format!("The backend refused to make {provider} the default").into())
            }
        }
        ProviderCommands::Test {
            provider,
            model,
            message,
        } => {
            let message = message.join(" ");
            let message = (!message.is_empty()).then_some(message.as_str());
            let result = context
                .track(
                    "provider",
                    service.test_provider(&provider, model.as_deref(), message),
                )
                .await?;
            let latency = result
                .latency_ms
                .map(|ms| format!(" in {ms:.0} ms"))
                .unwrap_or_default();
            if result.success {
                println!("✅ {provider} answered{latency}");
                if let Some(response) = result.response {
                    println!("{response}");
                }
                Ok(())
            } else {
                let reason = result.error.unwrap_or_else(|| "no details".to_string());
                Err(format!("{provider} test failed{latency}: {reason}").into())
            }
        }
        ProviderCommands::Recommend { use_case } => {
            let mut selector = ModelSelector::new(service);
            context.track("provider", selector.initialize()).await?;
            match selector.recommended_model(use_case) {
                Some(choice) => {
                    let label = selector
                        .model_info(&choice.provider, &choice.model)
                        .map(|model| model.label().to_string())
                        .unwrap_or_else(|| choice.model.clone());
                    println!("Recommended for {use_case}: {choice} ({label})");
                }
                None => println!("⚠️  No healthy provider offers a model right now"),
            }
            Ok(())
        }
        ProviderCommands::Config { provider } => {
            let manager = ProviderConfigManager::new(service);
            let config = context
                .track("provider", manager.safe_config(&provider))
                .await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ProviderCommands::Configure { provider, values } => {
            let manager = ProviderConfigManager::new(service);
            let config = config_map(values);
            if context
                .track("provider", manager.save_config(&provider, &config))
                .await?
            {
                println!("✅ Updated configuration for {provider}");
                Ok(())
            } else {
                Err(format!("The backend rejected the configuration for {provider}").into())
            }
        }
    }
}

/// Fails with the container's error message when the catalogue did not load.
async fn load(context: &CliContext) -> Result<ProvidersState, Box<dyn Error>> {
    let service = context.factory.provider_service();
    let loaded = load_providers(ProvidersState::default(), &service).await.state;
    match loaded.error {
        Some(error) => Err(error.into()),
        None => Ok(loaded),
    }
}

async fn toggle(context: &CliContext, provider: &str, enabled: bool) -> Result<(), Box<dyn Error>> {
    let service = context.factory.provider_service();
    let verb = if enabled { "enabled" } else { "disabled" };
    if context
        .track("provider", service.toggle_provider(provider, enabled))
        .await?
    {
        println!("✅ {provider} {verb}");
        Ok(())
    } else {
        Err(format!("The backend did not change {provider}").into())
    }
}

/// Values that parse as JSON keep their type; anything else is a string.
pub(crate) fn config_map(values: Vec<(String, String)>) -> Map<String, Value> {
    values
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect()
}

pub(crate) fn format_provider(provider: &Provider, is_saved_default: bool) -> String {
    let status = if provider.is_active { "●" } else { "○" };
    let mut line = format!(
        "  {status} {:<12} {} ({} models)",
        provider.name,
        provider.label(),
        provider.models.len()
    );
    if provider.is_default {
        line.push_str(" [backend default]");
    }
    if is_saved_default {
        line.push_str(" [your default]");
    }
    if provider.requires_api_key {
        line.push_str(" [needs API key]");
    }
    line
}

pub(crate) fn format_health(check: &ProviderHealth) -> String {
    let latency = check
        .latency_ms
        .map(|ms| format!(" {ms:.0} ms"))
        .unwrap_or_default();
    match check.status {
        HealthState::Healthy => format!("  ✅ {}{latency}", check.provider),
        HealthState::Unhealthy => format!(
            "  ❌ {}{latency}: {}",
            check.provider,
            check.error_message.as_deref().unwrap_or("unhealthy")
        ),
        HealthState::Unknown => format!("  ⚠️  {} status unknown", check.provider),
    }
}
