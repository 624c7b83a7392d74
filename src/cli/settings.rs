//! `auth`, `settings`, `set` and `unset`.

use std::error::Error;

use crate::api::ServiceSettings;
use crate::cli::context::CliContext;
use crate::cli::health::source_label;
use crate::cli::{AuthCommands, SettingsCommands};
use crate::core::config::{path_display, Config};
use crate::core::state::auth::{self, AuthAction, AuthState};
use crate::core::state::settings::{BackendPatch, PlatformSettingsPatch, SettingsAction};

pub fn run_auth(context: &mut CliContext, command: AuthCommands) -> Result<(), Box<dyn Error>> {
    let stored = context.driver.credentials().get_api_key()?;
    let state = auth::apply(AuthState::default(), AuthAction::Hydrate(stored)).state;

    match command {
        AuthCommands::Set { api_key } => {
            if !context.config.keyring_enabled() {
                eprintln!("⚠️  use-keyring is off; the key will only last for this run");
            }
            let state = context.commit(auth::apply(state, AuthAction::SetApiKey(api_key)))?;
            if state.has_api_key() {
                println!("✅ API key stored");
            } else {
                println!("✅ Blank key given; API key removed");
            }
            Ok(())
        }
        AuthCommands::Clear => {
            let had_key = state.has_api_key();
            context.commit(auth::apply(state, AuthAction::ClearApiKey))?;
            if had_key {
                println!("✅ API key removed");
            } else {
                println!("No API key was stored");
            }
            Ok(())
        }
        AuthCommands::Status => {
            if state.has_api_key() {
                println!("✅ An API key is stored");
            } else {
                println!("No API key stored; requests are sent without authorization");
            }
            Ok(())
        }
    }
}

pub fn run_settings(
    context: &mut CliContext,
    command: SettingsCommands,
) -> Result<(), Box<dyn Error>> {
    match command {
        SettingsCommands::Show => {
            let platform = &context.settings.platform;
            println!(
                "backend-url         {} (in use: {} from {})",
                context.settings.backend.base_url,
                context.factory.config().base_url(),
                source_label(context.base_url_source)
            );
            println!("theme               {}", platform.theme);
            println!("default-provider    {}", platform.default_provider);
            println!("auto-scroll         {}", platform.auto_scroll);
            println!("save-history        {}", platform.save_history);
            println!("show-timestamps     {}", platform.show_timestamps);
            println!("stream-responses    {}", platform.stream_responses);
            println!("max-history-length  {}", platform.max_history_length);
            println!("response-timeout    {}s", platform.response_timeout);
            Ok(())
        }
        SettingsCommands::Set { key, value } => {
            let action = settings_action(&key, &value)?;
            context.update_settings(action)?;
            Ok(())
        }
        SettingsCommands::Reset => {
            context.update_settings(SettingsAction::Reset)?;
            println!("✅ Settings restored to defaults");
            Ok(())
        }
    }
}

/// Maps `llmdesk settings set <key> <value>` to a settings action.
pub(crate) fn settings_action(key: &str, value: &str) -> Result<SettingsAction, String> {
    if key == "backend-url" {
        let errors = ServiceSettings::new(value).validate();
        if !errors.is_empty() {
            return Err(errors.join("; "));
        }
        return Ok(SettingsAction::UpdateBackend(BackendPatch {
            base_url: Some(value.trim().to_string()),
            connected: None,
        }));
    }

    let mut patch = PlatformSettingsPatch::default();
    match key {
        "theme" => patch.theme = Some(value.parse()?),
        "default-provider" => patch.default_provider = Some(value.to_string()),
        "auto-scroll" => patch.auto_scroll = Some(parse_flag(value)?),
        "save-history" => patch.save_history = Some(parse_flag(value)?),
        "show-timestamps" => patch.show_timestamps = Some(parse_flag(value)?),
        "stream-responses" => patch.stream_responses = Some(parse_flag(value)?),
        "max-history-length" => patch.max_history_length = Some(parse_number(value)?),
        "response-timeout" => patch.response_timeout = Some(parse_number(value)?),
        other => return Err(format!("Unknown setting: {other}")),
    }
    Ok(SettingsAction::UpdatePlatform(patch))
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("Expected true or false, got '{other}'")),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Expected a non-negative number, got '{value}'"))
}

pub fn set_config(key: &str, value: &[String]) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    if value.is_empty() {
        print_config(&config)?;
        return Ok(());
    }

    match apply_config_value(&mut config, key, &value.join(" ")) {
        Ok(message) => {
            config.save()?;
            println!("✅ {message}");
            Ok(())
        }
        Err(message) => {
            eprintln!("❌ {message}");
            std::process::exit(1);
        }
    }
}

pub fn unset_config(key: &str, value: Option<&str>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match clear_config_value(&mut config, key, value) {
        Ok(message) => {
            config.save()?;
            println!("✅ {message}");
            Ok(())
        }
        Err(message) => {
            eprintln!("❌ {message}");
            std::process::exit(1);
        }
    }
}

/// Applies one `llmdesk set` assignment; returns the confirmation message.
pub(crate) fn apply_config_value(
    config: &mut Config,
    key: &str,
    value: &str,
) -> Result<String, String> {
    match key {
        "base-url" => {
            let errors = ServiceSettings::new(value).validate();
            if !errors.is_empty() {
                return Err(errors.join("; "));
            }
            config.base_url = Some(value.trim().to_string());
        }
        "environment" => {
            if ServiceSettings::preset(value).is_none() {
                return Err(format!(
                    "Unknown environment: {value} (expected development or production)"
                ));
            }
            config.environment = Some(value.to_ascii_lowercase());
        }
        "timeout-ms" => {
            let timeout: i64 = parse_number(value)?;
            if timeout <= 0 {
                return Err("Timeout must be greater than 0".to_string());
            }
            config.timeout_ms = Some(timeout);
        }
        "retry-attempts" => {
            let attempts: i64 = parse_number(value)?;
            if attempts < 0 {
                return Err("Retry attempts must be 0 or greater".to_string());
            }
            config.retry_attempts = Some(attempts);
        }
        "default-provider" => config.default_provider = Some(value.to_string()),
        "default-model" => match value.split_once(' ') {
            Some((provider, model)) if !model.trim().is_empty() => {
                let model = model.trim();
                config.set_default_model(provider, model);
                return Ok(format!("Set default-model for provider '{provider}' to: {model}"));
            }
            _ => {
                return Err(
                    "To set a default model, specify the provider and model, e.g. \
                     llmdesk set default-model ollama llama3.1:8b"
                        .to_string(),
                )
            }
        },
        "use-keyring" => config.use_keyring = Some(parse_flag(value)?),
        other => return Err(format!("Unknown config key: {other}")),
    }
    Ok(format!("Set {key} to: {value}"))
}

pub(crate) fn clear_config_value(
    config: &mut Config,
    key: &str,
    value: Option<&str>,
) -> Result<String, String> {
    match key {
        "base-url" => config.base_url = None,
        "environment" => config.environment = None,
        "timeout-ms" => config.timeout_ms = None,
        "retry-attempts" => config.retry_attempts = None,
        "default-provider" => config.default_provider = None,
        "use-keyring" => config.use_keyring = None,
        "default-model" => {
            let Some(provider) = value else {
                return Err(
                    "To unset a default model, specify the provider, e.g. \
                     llmdesk unset default-model ollama"
                        .to_string(),
                );
            };
            config.default_models.remove(provider);
            return Ok(format!("Unset default-model for provider: {provider}"));
        }
        other => return Err(format!("Unknown config key: {other}")),
    }
    Ok(format!("Unset {key}"))
}

fn print_config(config: &Config) -> Result<(), Box<dyn Error>> {
    println!("Config file: {}", path_display(Config::get_config_path()?));
    let show = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
    println!("  base-url          {}", show(config.base_url.clone()));
    println!("  environment       {}", show(config.environment.clone()));
    println!("  timeout-ms        {}", show(config.timeout_ms.map(|v| v.to_string())));
    println!("  retry-attempts    {}", show(config.retry_attempts.map(|v| v.to_string())));
    println!("  default-provider  {}", show(config.default_provider.clone()));
    println!("  use-keyring       {}", config.keyring_enabled());
    let mut models: Vec<_> = config.default_models.iter().collect();
    models.sort();
    for (provider, model) in models {
        println!("  default-model     {provider} {model}");
    }
    Ok(())
}
