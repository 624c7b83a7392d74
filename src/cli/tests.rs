use super::*;
use crate::cli::context::CliContext;
use crate::core::config::{BaseUrlSource, Config};
use crate::core::keyring::{CredentialStore, MemoryCredentialStore};
use crate::core::state::chat::LocalConversation;
use crate::core::state::settings::{SettingsAction, Theme};
use crate::core::storage::{
    load_json, KeyValueStore, MemoryStore, KEY_BACKEND_URL, KEY_CONVERSATIONS,
    KEY_PLATFORM_SETTINGS,
};
use crate::services::providers::Provider;
use crate::utils::test_utils::{MockResponse, MockServer};
use serde_json::json;
use std::sync::Arc;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn context_for(
        server: &MockServer,
        store: &Arc<MemoryStore>,
        credentials: &Arc<MemoryCredentialStore>,
    ) -> CliContext {
        let store: Arc<dyn KeyValueStore> = store.clone();
        let credentials: Arc<dyn CredentialStore> = credentials.clone();
        CliContext::from_parts(Config::default(), Some(&server.base_url), store, credentials)
            .expect("context should build")
    }

    pub(super) fn chat_reply(text: &str) -> MockResponse {
        MockResponse::json(
            200,
            json!({
                "response": text,
                "chat_id": "c1",
                "provider": "google",
                "model": "gemini-pro",
                "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}
            }),
        )
    }
}

use test_helpers::{chat_reply, context_for, parse_args};

#[test]
fn no_subcommand_means_health_check() {
    let args = parse_args(&["llmdesk"]);
    assert!(args.command.is_none());
    assert!(!args.verbose);
}

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let args = parse_args(&["llmdesk", "health", "--api-url", "http://backend:9000", "-v"]);
    assert_eq!(args.api_url.as_deref(), Some("http://backend:9000"));
    assert!(args.verbose);
    assert!(matches!(args.command, Some(Commands::Health)));
}

#[test]
fn say_collects_the_prompt_words() {
    let argv = ["llmdesk", "say", "-p", "ollama", "-m", "llama3.1:8b", "what", "is", "rust"];
    match parse_args(&argv).command {
        Some(Commands::Say {
            provider,
            model,
            conversation,
            prompt,
        }) => {
            assert_eq!(provider.as_deref(), Some("ollama"));
            assert_eq!(model.as_deref(), Some("llama3.1:8b"));
            assert_eq!(conversation, None);
            assert_eq!(prompt, vec!["what", "is", "rust"]);
        }
        _ => panic!("expected say subcommand for argv={argv:?}"),
    }

    assert!(Args::try_parse_from(["llmdesk", "say"]).is_err());
}

#[test]
fn history_export_parses_the_format() {
    match parse_args(&["llmdesk", "history", "export", "c1", "--format", "json"]).command {
        Some(Commands::History {
            command: HistoryCommands::Export { chat_id, format },
        }) => {
            assert_eq!(chat_id, "c1");
            assert_eq!(format, ExportFormat::Json);
        }
        _ => panic!("expected history export"),
    }

    match parse_args(&["llmdesk", "history", "export", "c1"]).command {
        Some(Commands::History {
            command: HistoryCommands::Export { format, .. },
        }) => assert_eq!(format, ExportFormat::Text),
        _ => panic!("expected history export"),
    }

    assert!(Args::try_parse_from(["llmdesk", "history", "export", "c1", "-f", "pdf"]).is_err());
}

#[test]
fn provider_configure_takes_key_value_pairs() {
    let argv = ["llmdesk", "providers", "configure", "openai", "api_key=sk-1", "temperature=0.5"];
    match parse_args(&argv).command {
        Some(Commands::Providers {
            command: ProviderCommands::Configure { provider, values },
        }) => {
            assert_eq!(provider, "openai");
            assert_eq!(
                values,
                vec![
                    ("api_key".to_string(), "sk-1".to_string()),
                    ("temperature".to_string(), "0.5".to_string())
                ]
            );
        }
        _ => panic!("expected providers configure for argv={argv:?}"),
    }

    assert!(Args::try_parse_from(["llmdesk", "providers", "configure", "openai", "oops"]).is_err());
    assert!(Args::try_parse_from(["llmdesk", "providers", "configure", "openai", "=x"]).is_err());
}

#[test]
fn recommend_defaults_to_chat() {
    match parse_args(&["llmdesk", "providers", "recommend"]).command {
        Some(Commands::Providers {
            command: ProviderCommands::Recommend { use_case },
        }) => assert_eq!(use_case, UseCase::Chat),
        _ => panic!("expected providers recommend"),
    }
    assert!(Args::try_parse_from(["llmdesk", "providers", "recommend", "poetry"]).is_err());
}

#[test]
fn mcp_add_parses_transport_and_args() {
    let argv = [
        "llmdesk", "mcp", "add", "fs", "--command", "mcp-fs", "--arg", "--root", "--arg", "/tmp",
    ];
    match parse_args(&argv).command {
        Some(Commands::Mcp {
            command:
                McpCommands::Add {
                    name,
                    transport,
                    command,
                    args,
                    url,
                    ..
                },
        }) => {
            assert_eq!(name, "fs");
            assert_eq!(transport, TransportType::Stdio);
            assert_eq!(command.as_deref(), Some("mcp-fs"));
            assert_eq!(args, vec!["--root", "/tmp"]);
            assert_eq!(url, None);
        }
        _ => panic!("expected mcp add for argv={argv:?}"),
    }
}

#[test]
fn settings_keys_map_to_actions() {
    use crate::cli::settings::settings_action;

    match settings_action("theme", "Dark") {
        Ok(SettingsAction::UpdatePlatform(patch)) => assert_eq!(patch.theme, Some(Theme::Dark)),
        other => panic!("unexpected action: {other:?}"),
    }
    match settings_action("save-history", "off") {
        Ok(SettingsAction::UpdatePlatform(patch)) => assert_eq!(patch.save_history, Some(false)),
        other => panic!("unexpected action: {other:?}"),
    }
    match settings_action("backend-url", " http://10.0.0.2:8000 ") {
        Ok(SettingsAction::UpdateBackend(patch)) => {
            assert_eq!(patch.base_url.as_deref(), Some("http://10.0.0.2:8000"))
        }
        other => panic!("unexpected action: {other:?}"),
    }

    assert_eq!(
        settings_action("backend-url", "not a url").unwrap_err(),
        "Base URL must be a valid URL"
    );
    assert!(settings_action("max-history-length", "-4").is_err());
    assert!(settings_action("auto-scroll", "maybe").is_err());
    assert_eq!(settings_action("font", "mono").unwrap_err(), "Unknown setting: font");
}

#[test]
fn config_values_are_validated_before_saving() {
    use crate::cli::settings::{apply_config_value, clear_config_value};

    let mut config = Config::default();
    assert!(apply_config_value(&mut config, "environment", "Production").is_ok());
    assert_eq!(config.environment.as_deref(), Some("production"));
    assert!(apply_config_value(&mut config, "environment", "staging").is_err());

    assert!(apply_config_value(&mut config, "timeout-ms", "0").is_err());
    assert!(apply_config_value(&mut config, "retry-attempts", "-1").is_err());
    assert!(apply_config_value(&mut config, "retry-attempts", "4").is_ok());
    assert_eq!(config.retry_attempts, Some(4));

    let message = apply_config_value(&mut config, "default-model", "ollama llama3.1:8b").unwrap();
    assert_eq!(message, "Set default-model for provider 'ollama' to: llama3.1:8b");
    assert_eq!(config.default_model_for("ollama"), Some("llama3.1:8b"));
    assert!(apply_config_value(&mut config, "default-model", "ollama").is_err());

    assert!(clear_config_value(&mut config, "default-model", None).is_err());
    assert!(clear_config_value(&mut config, "default-model", Some("ollama")).is_ok());
    assert_eq!(config.default_model_for("ollama"), None);
    assert!(clear_config_value(&mut config, "retry-attempts", None).is_ok());
    assert_eq!(config.retry_attempts, None);
    assert!(clear_config_value(&mut config, "colour", None).is_err());
}

#[test]
fn key_value_input_keeps_json_types() {
    let config = crate::cli::providers::config_map(vec![
        ("temperature".to_string(), "0.5".to_string()),
        ("stream".to_string(), "true".to_string()),
        ("region".to_string(), "us-east-1".to_string()),
    ]);
    assert_eq!(config["temperature"], json!(0.5));
    assert_eq!(config["stream"], json!(true));
    assert_eq!(config["region"], json!("us-east-1"));
}

#[test]
fn tool_input_must_be_an_object() {
    use crate::cli::mcp::parse_tool_input;

    assert_eq!(parse_tool_input(r#"{"path": "/tmp"}"#).unwrap()["path"], "/tmp");
    assert!(parse_tool_input("[1, 2]").is_err());
    assert!(parse_tool_input("{not json").is_err());
}

#[test]
fn prompts_compose_only_from_given_parts() {
    use crate::cli::prompts::{compose, PromptParts};

    assert!(compose(PromptParts::default()).is_none());

    let built = compose(PromptParts {
        role: Some("a release manager".to_string()),
        expertise: vec!["changelogs".to_string()],
        constraints: vec!["Be brief".to_string()],
        ..Default::default()
    })
    .unwrap();
    assert!(built.content.starts_with("You are a release manager."));
    assert!(built.content.contains("- changelogs"));
    assert!(built.content.contains("## Guidelines"));
    assert!(!built.content.contains("## Instructions"));
}

#[test]
fn provider_lines_show_defaults_and_state() {
    use crate::cli::providers::format_provider;

    let provider: Provider = serde_json::from_value(json!({
        "name": "openai",
        "display_name": "OpenAI",
        "is_active": true,
        "is_default": true,
        "requires_api_key": true,
        "models": [{"model_name": "gpt-4o"}]
    }))
    .unwrap();
    let line = format_provider(&provider, false);
    assert!(line.contains("● openai"));
    assert!(line.contains("(1 models)"));
    assert!(line.contains("[backend default]"));
    assert!(line.contains("[needs API key]"));
    assert!(!line.contains("[your default]"));
    assert!(format_provider(&provider, true).contains("[your default]"));
}

#[tokio::test]
async fn context_reads_persisted_state() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let store = Arc::new(MemoryStore::new());
    store.set(KEY_BACKEND_URL, "http://saved:8000").unwrap();
    store
        .set(KEY_PLATFORM_SETTINGS, r#"{"defaultProvider":"anthropic","saveHistory":false}"#)
        .unwrap();
    store
        .set(
            KEY_CONVERSATIONS,
            r#"[{"id":"l1","title":"Old","createdAt":"2024-05-01T10:00:00","updatedAt":"2024-05-01T10:00:00"}]"#,
        )
        .unwrap();
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.set_api_key("sk-saved").unwrap();

    let context = context_for(&server, &store, &credentials);
    assert_eq!(context.base_url_source, BaseUrlSource::Override);
    assert_eq!(context.factory.config().base_url(), server.base_url);
    assert_eq!(context.factory.config().api_key(), Some("sk-saved"));
    assert_eq!(context.settings.backend.base_url, "http://saved:8000");
    assert_eq!(context.settings.platform.default_provider, "anthropic");

    // History saving is off, so stored conversations are not loaded.
    let chat = context.chat_state().unwrap();
    assert!(!chat.save_history);
    assert!(chat.conversations.is_empty());
}

#[tokio::test]
async fn settings_updates_are_persisted() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = context_for(&server, &store, &credentials);

    settings::run_settings(
        &mut context,
        SettingsCommands::Set {
            key: "theme".to_string(),
            value: "light".to_string(),
        },
    )
    .unwrap();
    let stored: serde_json::Value = load_json(store.as_ref(), KEY_PLATFORM_SETTINGS)
        .unwrap()
        .unwrap();
    assert_eq!(stored["theme"], "light");

    settings::run_settings(&mut context, SettingsCommands::Reset).unwrap();
    assert_eq!(store.get(KEY_PLATFORM_SETTINGS).unwrap(), None);
    assert_eq!(store.get(KEY_BACKEND_URL).unwrap(), None);
    assert_eq!(context.settings.platform.theme, Theme::System);
}

#[tokio::test]
async fn auth_commands_rotate_the_stored_key() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = context_for(&server, &store, &credentials);

    settings::run_auth(
        &mut context,
        AuthCommands::Set {
            api_key: " sk-new ".to_string(),
        },
    )
    .unwrap();
    assert_eq!(credentials.get_api_key().unwrap().as_deref(), Some("sk-new"));

    settings::run_auth(&mut context, AuthCommands::Clear).unwrap();
    assert_eq!(credentials.get_api_key().unwrap(), None);
}

#[tokio::test]
async fn say_records_the_exchange_locally() {
    let server = MockServer::one(chat_reply("Hi there")).await;
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = context_for(&server, &store, &credentials);

    say::run_say(
        &mut context,
        vec!["hello".to_string()],
        Some("google".to_string()),
        Some("gemini-pro".to_string()),
        None,
    )
    .await
    .unwrap();

    let request = server.last_request().await;
    assert_eq!(request.path(), "/chat");
    assert_eq!(
        request.json(),
        json!({"message": "hello", "provider": "google", "model": "gemini-pro"})
    );

    let saved: Vec<LocalConversation> = load_json(store.as_ref(), KEY_CONVERSATIONS)
        .unwrap()
        .unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "hello");
    assert_eq!(saved[0].chat_id.as_deref(), Some("c1"));
    assert_eq!(saved[0].messages.len(), 2);
    assert_eq!(saved[0].messages[1].content, "Hi there");

    say::run_retry(&mut context, None).await.unwrap();
    let retried = server.last_request().await;
    assert_eq!(retried.json()["message"], "hello");
    assert_eq!(retried.json()["chat_id"], "c1");
}

#[tokio::test]
async fn say_fails_for_unknown_conversation() {
    let server = MockServer::one(chat_reply("unused")).await;
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = context_for(&server, &store, &credentials);

    let err = say::run_say(
        &mut context,
        vec!["hello".to_string()],
        Some("google".to_string()),
        Some("gemini-pro".to_string()),
        Some("missing".to_string()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "No local conversation with id missing");
    assert!(server.requests().await.is_empty());
}

#[tokio::test]
async fn tracked_calls_are_counted() {
    let server = MockServer::start(vec![
        MockResponse::json(200, json!({"chats": [], "total": 0, "page": 1, "limit": 20})),
        MockResponse::json(404, json!({"message": "missing"})),
    ])
    .await;
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = context_for(&server, &store, &credentials);

    history::run(&mut context, HistoryCommands::List { page: 1, limit: 20 })
        .await
        .unwrap();
    assert!(history::run(
        &mut context,
        HistoryCommands::Show {
            chat_id: "gone".to_string()
        }
    )
    .await
    .is_err());

    let metrics = context.metrics().service_metrics("chat").unwrap();
    assert_eq!(metrics.calls, 2);
    assert_eq!(metrics.errors, 1);
}
