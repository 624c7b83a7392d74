//! Backend and platform settings.

use super::{Effect, Notice, NoticeLevel, Transition};
use crate::core::storage::{KEY_BACKEND_URL, KEY_PLATFORM_SETTINGS};
use crate::services::providers::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const FALLBACK_PROVIDER: &str = "google";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!("Unknown theme: {other}")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        f.write_str(name)
    }
}

/// User preferences. Missing fields in stored JSON take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformSettings {
    pub theme: Theme,
    pub default_provider: String,
    pub auto_scroll: bool,
    pub save_history: bool,
    pub show_timestamps: bool,
    pub stream_responses: bool,
    pub max_history_length: usize,
    /// Seconds.
    pub response_timeout: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            default_provider: FALLBACK_PROVIDER.to_string(),
            auto_scroll: true,
            save_history: true,
            show_timestamps: true,
            stream_responses: true,
            max_history_length: 100,
            response_timeout: 30,
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSettingsPatch {
    pub theme: Option<Theme>,
    pub default_provider: Option<String>,
    pub auto_scroll: Option<bool>,
    pub save_history: Option<bool>,
    pub show_timestamps: Option<bool>,
    pub stream_responses: Option<bool>,
    pub max_history_length: Option<usize>,
    pub response_timeout: Option<u64>,
}

impl PlatformSettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn merge_into(self, settings: &mut PlatformSettings) {
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(provider) = self.default_provider {
            settings.default_provider = provider;
        }
        if let Some(value) = self.auto_scroll {
            settings.auto_scroll = value;
        }
        if let Some(value) = self.save_history {
            settings.save_history = value;
        }
        if let Some(value) = self.show_timestamps {
            settings.show_timestamps = value;
        }
        if let Some(value) = self.stream_responses {
            settings.stream_responses = value;
        }
        if let Some(value) = self.max_history_length {
            settings.max_history_length = value;
        }
        if let Some(value) = self.response_timeout {
            settings.response_timeout = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub connected: bool,
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            connected: false,
            last_check: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendPatch {
    pub base_url: Option<String>,
    pub connected: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsState {
    pub backend: BackendConfig,
    pub platform: PlatformSettings,
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    /// Values read back from storage; absent values keep the defaults.
    Hydrate {
        backend_url: Option<String>,
        platform: Option<PlatformSettings>,
    },
    UpdateBackend(BackendPatch),
    UpdatePlatform(PlatformSettingsPatch),
    Save,
    ConnectionChecked { connected: bool },
    /// Point `default_provider` at an active provider if it is not one.
    EnsureDefaultProvider(Vec<Provider>),
    Reset,
}

pub fn apply(
    state: SettingsState,
    action: SettingsAction,
    now: DateTime<Utc>,
) -> Transition<SettingsState> {
    match action {
        SettingsAction::Hydrate {
            backend_url,
            platform,
        } => {
            let mut state = state;
            if let Some(url) = backend_url.filter(|url| !url.trim().is_empty()) {
                state.backend.base_url = url;
            }
            if let Some(platform) = platform {
                state.platform = platform;
            }
            Transition::new(state)
        }
        SettingsAction::UpdateBackend(patch) => {
            let mut state = state;
            if let Some(url) = patch.base_url {
                state.backend.base_url = url;
            }
            if let Some(connected) = patch.connected {
                state.backend.connected = connected;
            }
            save(state, now)
        }
        SettingsAction::UpdatePlatform(patch) => {
            let mut state = state;
            patch.merge_into(&mut state.platform);
            save(state, now)
        }
        SettingsAction::Save => save(state, now),
        SettingsAction::ConnectionChecked { connected } => {
            let mut state = state;
            state.backend.connected = connected;
            state.backend.last_check = Some(now);
            Transition::new(state)
        }
        SettingsAction::EnsureDefaultProvider(providers) => {
            match replacement_default(&state.platform.default_provider, &providers) {
                Some(name) => {
                    let mut state = state;
                    state.platform.default_provider = name;
                    save(state, now)
                }
                None => Transition::new(state),
            }
        }
        SettingsAction::Reset => Transition::with_effects(
            SettingsState::default(),
            vec![
                Effect::Remove {
                    key: KEY_BACKEND_URL,
                },
                Effect::Remove {
                    key: KEY_PLATFORM_SETTINGS,
                },
            ],
        ),
    }
}

fn save(mut state: SettingsState, now: DateTime<Utc>) -> Transition<SettingsState> {
    state.last_saved = Some(now);
    let mut effects = vec![Effect::Persist {
        key: KEY_BACKEND_URL,
        value: state.backend.base_url.clone(),
    }];
    match serde_json::to_string(&state.platform) {
        Ok(value) => effects.push(Effect::Persist {
            key: KEY_PLATFORM_SETTINGS,
            value,
        }),
        Err(err) => {
            effects.push(Effect::Notify(Notice::new(
                NoticeLevel::Error,
                "Save Failed",
                format!("Failed to save settings: {err}"),
            )));
            return Transition::with_effects(state, effects);
        }
    }
    effects.push(Effect::Notify(Notice::new(
        NoticeLevel::Success,
        "Settings Saved",
        "Your configuration has been saved successfully",
    )));
    Transition::with_effects(state, effects)
}

fn replacement_default(current: &str, providers: &[Provider]) -> Option<String> {
    let active = || providers.iter().filter(|provider| provider.is_active);
    if active().any(|provider| provider.name == current) {
        return None;
    }
    active()
        .find(|provider| provider.name == FALLBACK_PROVIDER)
        .or_else(|| active().next())
        .map(|provider| provider.name.clone())
}

/// Icon name shown next to a provider.
pub fn provider_icon(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "sparkles",
        "google" => "beaker",
        "bedrock" => "cloud",
        "ollama" => "server",
        _ => "cpu-chip",
    }
}

/// Accent colour shown next to a provider.
pub fn provider_color(provider: &str) -> &'static str {
    match provider {
        "openai" => "blue",
        "anthropic" => "orange",
        "google" => "green",
        "bedrock" => "purple",
        _ => "gray",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, is_active: bool) -> Provider {
        serde_json::from_value(serde_json::json!({"name": name, "is_active": is_active}))
            .expect("provider fixture")
    }

    #[test]
    fn stored_platform_settings_merge_over_defaults() {
        let stored: PlatformSettings =
            serde_json::from_str(r#"{"theme":"dark","maxHistoryLength":5}"#).unwrap();
        assert_eq!(stored.theme, Theme::Dark);
        assert_eq!(stored.max_history_length, 5);
        assert_eq!(stored.default_provider, "google");
        assert!(stored.save_history);

        let transition = apply(
            SettingsState::default(),
            SettingsAction::Hydrate {
                backend_url: Some("http://remote:9000".to_string()),
                platform: Some(stored),
            },
            Utc::now(),
        );
        assert_eq!(transition.state.backend.base_url, "http://remote:9000");
        assert_eq!(transition.state.platform.theme, Theme::Dark);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn updates_persist_both_keys_and_notify() {
        let now = Utc::now();
        let transition = apply(
            SettingsState::default(),
            SettingsAction::UpdatePlatform(PlatformSettingsPatch {
                save_history: Some(false),
                ..Default::default()
            }),
            now,
        );

        assert!(!transition.state.platform.save_history);
        assert_eq!(transition.state.last_saved, Some(now));
        match &transition.effects[..] {
            [Effect::Persist { key: url_key, value: url }, Effect::Persist { key: platform_key, value: platform }, Effect::Notify(notice)] =>
            {
                assert_eq!(*url_key, KEY_BACKEND_URL);
                assert_eq!(url, DEFAULT_BACKEND_URL);
                assert_eq!(*platform_key, KEY_PLATFORM_SETTINGS);
                assert!(platform.contains(r#""saveHistory":false"#));
                assert_eq!(notice.title, "Settings Saved");
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn default_provider_falls_back_to_active_ones() {
        let mut state = SettingsState::default();
        state.platform.default_provider = "openai".to_string();

        let providers = vec![
            provider("openai", false),
            provider("ollama", true),
            provider("google", true),
        ];
        let transition = apply(
            state.clone(),
            SettingsAction::EnsureDefaultProvider(providers),
            Utc::now(),
        );
        assert_eq!(transition.state.platform.default_provider, "google");

        let providers = vec![provider("openai", false), provider("ollama", true)];
        let transition = apply(
            state.clone(),
            SettingsAction::EnsureDefaultProvider(providers),
            Utc::now(),
        );
        assert_eq!(transition.state.platform.default_provider, "ollama");

        let providers = vec![provider("openai", true)];
        let transition = apply(state, SettingsAction::EnsureDefaultProvider(providers), Utc::now());
        assert_eq!(transition.state.platform.default_provider, "openai");
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn reset_restores_defaults_and_removes_keys() {
        let mut state = SettingsState::default();
        state.backend.base_url = "http://elsewhere".to_string();
        state.platform.theme = Theme::Light;

        let transition = apply(state, SettingsAction::Reset, Utc::now());
        assert_eq!(transition.state, SettingsState::default());
        assert_eq!(
            transition.effects,
            vec![
                Effect::Remove {
                    key: KEY_BACKEND_URL
                },
                Effect::Remove {
                    key: KEY_PLATFORM_SETTINGS
                },
            ]
        );
    }

    #[test]
    fn provider_presentation() {
        assert_eq!(provider_icon("anthropic"), "sparkles");
        assert_eq!(provider_color("bedrock"), "purple");
        assert_eq!(provider_icon("mystery"), "cpu-chip");
        assert_eq!(provider_color("ollama"), "gray");
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
    }
}
