//! One-shot chat from the command line.
//!
//! Messages go through the same chat container the rest of the client uses,
//! so every exchange lands in the local conversation history.

use std::error::Error;

use chrono::Utc;

use crate::cli::context::CliContext;
use crate::core::state::chat::{self, message_usage, ChatAction, ChatController, ChatState};
use crate::core::state::providers::{
    self as providers_state, load_providers, ProvidersAction, ProvidersState,
};
use crate::services::chat::ChatResponse;

fn step(
    context: &mut CliContext,
    state: ChatState,
    action: ChatAction,
) -> Result<ChatState, Box<dyn Error>> {
    context.commit(chat::apply(state, action, Utc::now()))
}

pub async fn run_say(
    context: &mut CliContext,
    prompt: Vec<String>,
    provider: Option<String>,
    model: Option<String>,
    conversation: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let content = prompt.join(" ");
    if content.trim().is_empty() {
        eprintln!("Usage: llmdesk say <prompt>");
        std::process::exit(1);
    }

    let mut state = context.chat_state()?;
    if let Some(id) = conversation {
        state = open_conversation(context, state, &id)?;
    }

    let provider = provider
        .or_else(|| state.selected_provider.clone())
        .or_else(|| context.config.default_provider.clone())
        .unwrap_or_else(|| context.settings.platform.default_provider.clone());
    let model = match model.or_else(|| remembered_model(context, &state, &provider)) {
        Some(model) => model,
        None => first_model(context, &provider).await?,
    };
    state = step(context, state, ChatAction::SelectModel { provider, model })?;

    let controller = ChatController::new(context.factory.chat_service());
    let result = controller
        .send_message(&mut state, &mut context.driver, &content)
        .await;
    context.print_notices();
    print_reply(&state, &result?);
    Ok(())
}

pub async fn run_retry(
    context: &mut CliContext,
    conversation: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let state = context.chat_state()?;
    let id = match conversation {
        Some(id) => id,
        None => match state.conversation_history().first() {
            Some(latest) => latest.id.clone(),
            None => return Err("There are no local conversations to retry".into()),
        },
    };
    let mut state = open_conversation(context, state, &id)?;

    let controller = ChatController::new(context.factory.chat_service());
    let result = controller
        .retry_last_message(&mut state, &mut context.driver)
        .await;
    context.print_notices();
    match result? {
        Some(response) => print_reply(&state, &response),
        None => println!("Nothing to retry in {id}"),
    }
    Ok(())
}

fn open_conversation(
    context: &mut CliContext,
    state: ChatState,
    id: &str,
) -> Result<ChatState, Box<dyn Error>> {
    let state = step(context, state, ChatAction::SelectConversation(id.to_string()))?;
    if state.current.as_deref() == Some(id) {
        Ok(state)
    } else {
        Err(format!("No local conversation with id {id}").into())
    }
}

/// The conversation's model if it used this provider, else the configured one.
fn remembered_model(context: &CliContext, state: &ChatState, provider: &str) -> Option<String> {
    if state.selected_provider.as_deref() == Some(provider) {
        if let Some(model) = &state.selected_model {
            return Some(model.clone());
        }
    }
    context.config.default_model_for(provider).map(str::to_string)
}

async fn first_model(context: &CliContext, provider: &str) -> Result<String, Box<dyn Error>> {
    let service = context.factory.provider_service();
    let loaded = load_providers(ProvidersState::default(), &service).await.state;
    if let Some(error) = loaded.error {
        return Err(error.into());
    }
    let selected =
        providers_state::apply(loaded, ProvidersAction::SetProvider(provider.to_string())).state;
    let has_models = match selected.selected_provider() {
        Some(found) => !found.models.is_empty(),
        None => return Err(format!("Unknown provider: {provider}").into()),
    };
    if !has_models {
        return Err(format!("Provider {provider} has no models").into());
    }
    Ok(selected.current_model)
}

fn print_reply(state: &ChatState, response: &ChatResponse) {
    println!("{}", response.response);

    let mut footer = format!("{}/{}", response.provider, response.model);
    let usage = state
        .latest_message()
        .and_then(message_usage)
        .and_then(|usage| usage.get("total_tokens"))
        .and_then(|total| total.as_u64());
    if let Some(total) = usage {
        footer.push_str(&format!(" · {total} tokens"));
    }
    if let Some(conversation) = &state.current {
        footer.push_str(&format!(" · conversation {conversation}"));
    }
    eprintln!("{footer}");
}
