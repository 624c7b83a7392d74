//! Local conversations and the chat send loop.

use super::{Effect, EffectDriver, Notice, NoticeLevel, Transition};
use crate::api::ServiceError;
use crate::core::storage::KEY_CONVERSATIONS;
use crate::services::chat::{ChatRequest, ChatRequestParams, ChatResponse, Message, MessageRole};
use crate::services::ChatService;
use crate::utils::ids::generate_id;
use crate::utils::time::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";
const TITLE_MAX_CHARS: usize = 50;

/// A conversation kept on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Backend chat id, once the backend has answered in this conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub conversations: Vec<LocalConversation>,
    /// Id of the open conversation.
    pub current: Option<String>,
    /// Messages of the open conversation as displayed.
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub selected_provider: Option<String>,
    pub selected_model: Option<String>,
    pub error: Option<String>,
    pub save_history: bool,
    pub max_history_length: usize,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            current: None,
            messages: Vec::new(),
            is_loading: false,
            selected_provider: None,
            selected_model: None,
            error: None,
            save_history: true,
            max_history_length: 100,
        }
    }
}

impl ChatState {
    pub fn current_conversation(&self) -> Option<&LocalConversation> {
        let id = self.current.as_deref()?;
        self.conversations.iter().find(|conv| conv.id == id)
    }

    fn current_conversation_mut(&mut self) -> Option<&mut LocalConversation> {
        let id = self.current.clone()?;
        self.conversations.iter_mut().find(|conv| conv.id == id)
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn latest_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Conversations, most recently updated first.
    pub fn conversation_history(&self) -> Vec<&LocalConversation> {
        let mut history: Vec<_> = self.conversations.iter().collect();
        history.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        history
    }

    pub fn can_send(&self) -> bool {
        !self.is_loading && self.selected_provider.is_some() && self.selected_model.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    /// Conversations read back from storage. Ignored unless history is saved.
    Hydrate(Vec<LocalConversation>),
    ConfigureHistory {
        save_history: bool,
        max_history_length: usize,
    },
    SelectModel {
        provider: String,
        model: String,
    },
    CreateConversation {
        id: String,
    },
    SelectConversation(String),
    RenameConversation {
        id: String,
        title: String,
    },
    DeleteConversation(String),
    AddMessage {
        id: String,
        role: MessageRole,
        content: String,
    },
    SendStarted {
        conversation_id: String,
        message_id: String,
        content: String,
    },
    SendSucceeded {
        message_id: String,
        response: ChatResponse,
    },
    SendFailed {
        message_id: String,
        error: String,
    },
    /// Drops the last message if the assistant wrote it.
    DropTrailingAssistant,
    ClearCurrent,
    ClearAll,
}

pub fn apply(state: ChatState, action: ChatAction, now: DateTime<Utc>) -> Transition<ChatState> {
    let mut state = state;
    match action {
        ChatAction::Hydrate(conversations) => {
            if state.save_history {
                state.conversations = conversations;
            }
            Transition::new(state)
        }
        ChatAction::ConfigureHistory {
            save_history,
            max_history_length,
        } => {
            state.save_history = save_history;
            state.max_history_length = max_history_length;
            Transition::new(state)
        }
        ChatAction::SelectModel { provider, model } => {
            state.selected_provider = Some(provider);
            state.selected_model = Some(model);
            Transition::new(state)
        }
        ChatAction::CreateConversation { id } => {
            create_conversation(&mut state, id, now);
            Transition::new(state)
        }
        ChatAction::SelectConversation(id) => {
            if let Some(conversation) = state.conversations.iter().find(|conv| conv.id == id) {
                state.messages = conversation.messages.clone();
                state.selected_provider = conversation.provider.clone();
                state.selected_model = conversation.model.clone();
                state.current = Some(id);
            }
            Transition::new(state)
        }
        ChatAction::RenameConversation { id, title } => {
            match state.conversations.iter_mut().find(|conv| conv.id == id) {
                Some(conversation) => {
                    conversation.title = title;
                    conversation.updated_at = now;
                    persist(state)
                }
                None => Transition::new(state),
            }
        }
        ChatAction::DeleteConversation(id) => {
            state.conversations.retain(|conv| conv.id != id);
            if state.current.as_deref() == Some(id.as_str()) {
                state.current = None;
                state.messages.clear();
            }
            persist(state)
        }
        ChatAction::AddMessage { id, role, content } => {
            let message = Message {
                id,
                role,
                content,
                timestamp: now,
                provider: state.selected_provider.clone(),
                model: state.selected_model.clone(),
                metadata: None,
            };
            push_message(&mut state, message, now);
            persist(state)
        }
        ChatAction::SendStarted {
            conversation_id,
            message_id,
            content,
        } => {
            state.error = None;
            if state.current_conversation().is_none() {
                create_conversation(&mut state, conversation_id, now);
            }
            let message = Message {
                id: message_id,
                role: MessageRole::User,
                content: content.trim().to_string(),
                timestamp: now,
                provider: state.selected_provider.clone(),
                model: state.selected_model.clone(),
                metadata: None,
            };
            push_message(&mut state, message, now);
            state.is_loading = true;
            persist(state)
        }
        ChatAction::SendSucceeded {
            message_id,
            response,
        } => {
            let metadata = response.usage.and_then(|usage| {
                let mut metadata = Map::new();
                metadata.insert("usage".to_string(), serde_json::to_value(usage).ok()?);
                Some(metadata)
            });
            if let Some(conversation) = state.current_conversation_mut() {
                conversation.chat_id = Some(response.chat_id.clone());
            }
            let message = Message {
                id: message_id,
                role: MessageRole::Assistant,
                content: response.response,
                timestamp: now,
                provider: Some(response.provider),
                model: Some(response.model),
                metadata,
            };
            push_message(&mut state, message, now);
            state.is_loading = false;
            persist(state)
        }
        ChatAction::SendFailed { message_id, error } => {
            let message = Message {
                id: message_id,
                role: MessageRole::Assistant,
                content: apology(&error),
                timestamp: now,
                provider: state.selected_provider.clone(),
                model: state.selected_model.clone(),
                metadata: None,
            };
            state.error = Some(error);
            push_message(&mut state, message, now);
            state.is_loading = false;
            persist(state)
        }
        ChatAction::DropTrailingAssistant => {
            if state
                .messages
                .last()
                .is_some_and(|message| message.role == MessageRole::Assistant)
            {
                state.messages.pop();
                if let Some(conversation) = state.current_conversation_mut() {
                    conversation.messages.pop();
                }
            }
            Transition::new(state)
        }
        ChatAction::ClearCurrent => {
            state.messages.clear();
            state.current = None;
            state.error = None;
            Transition::new(state)
        }
        ChatAction::ClearAll => {
            state.conversations.clear();
            state.messages.clear();
            state.current = None;
            state.error = None;
            Transition::with_effects(
                state,
                vec![Effect::Remove {
                    key: KEY_CONVERSATIONS,
                }],
            )
        }
    }
}

/// Text of the assistant message recorded when a send fails.
pub fn apology(error: &str) -> String {
    format!(
        "I apologize, but I encountered an error: {error}. Please check your provider configuration and try again."
    )
}

fn create_conversation(state: &mut ChatState, id: String, now: DateTime<Utc>) {
    let conversation = LocalConversation {
        id: id.clone(),
        title: NEW_CONVERSATION_TITLE.to_string(),
        messages: Vec::new(),
        created_at: now,
        updated_at: now,
        provider: state.selected_provider.clone(),
        model: state.selected_model.clone(),
        chat_id: None,
    };
    state.conversations.insert(0, conversation);
    state.current = Some(id);
    state.messages.clear();
}

fn push_message(state: &mut ChatState, message: Message, now: DateTime<Utc>) {
    if let Some(conversation) = state.current_conversation_mut() {
        if conversation.title == NEW_CONVERSATION_TITLE
            && message.role == MessageRole::User
            && !message.content.is_empty()
        {
            conversation.title = auto_title(&message.content);
        }
        conversation.messages.push(message.clone());
        conversation.updated_at = now;
    }
    state.messages.push(message);
}

fn auto_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

fn persist(state: ChatState) -> Transition<ChatState> {
    if !state.save_history {
        return Transition::new(state);
    }

    let kept = state.conversations.len().min(state.max_history_length);
    let effect = match serde_json::to_string(&state.conversations[..kept]) {
        Ok(value) => Effect::Persist {
            key: KEY_CONVERSATIONS,
            value,
        },
        Err(err) => Effect::Notify(Notice::new(
            NoticeLevel::Error,
            "Save Failed",
            format!("Failed to save conversations: {err}"),
        )),
    };
    Transition::with_effects(state, vec![effect])
}

/// Runs chat actions that need the backend, applying effects as it goes.
#[derive(Debug, Clone)]
pub struct ChatController {
    chat: Arc<ChatService>,
}

impl ChatController {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    /// The new state is kept even if an effect fails; the failure lands in `error`.
    fn step(
        state: &mut ChatState,
        driver: &mut EffectDriver,
        action: ChatAction,
    ) -> Result<(), ServiceError> {
        let Transition { state: next, effects } = apply(state.clone(), action, Utc::now());
        *state = next;
        if let Err(err) = driver.run(effects) {
            state.error = Some(err.to_string());
            state.is_loading = false;
            return Err(ServiceError::Other(Box::new(err)));
        }
        Ok(())
    }

    /// Sends `content` in the open conversation, creating one if needed.
    ///
    /// A backend failure is recorded in the state (error plus an apology
    /// message) and then returned, even if saving that record fails.
    pub async fn send_message(
        &self,
        state: &mut ChatState,
        driver: &mut EffectDriver,
        content: &str,
    ) -> Result<ChatResponse, ServiceError> {
        if !state.can_send() || content.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "Cannot send message: Invalid state or empty content".to_string(),
            ));
        }

        Self::step(
            state,
            driver,
            ChatAction::SendStarted {
                conversation_id: generate_id(),
                message_id: generate_id(),
                content: content.to_string(),
            },
        )?;

        let result = match self.build_request(state, content) {
            Ok(request) => self.chat.send_message(&request).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(response) => {
                debug!(chat_id = %response.chat_id, "Chat reply recorded");
                Self::step(
                    state,
                    driver,
                    ChatAction::SendSucceeded {
                        message_id: generate_id(),
                        response: response.clone(),
                    },
                )?;
                Ok(response)
            }
            Err(err) => {
                let recorded = Self::step(
                    state,
                    driver,
                    ChatAction::SendFailed {
                        message_id: generate_id(),
                        error: err.to_string(),
                    },
                );
                if let Err(storage) = recorded {
                    warn!(error = %storage, "Could not save the failed exchange");
                    state.error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Resends the last user message, replacing a trailing assistant reply.
    ///
    /// Returns `Ok(None)` when there is nothing to retry.
    pub async fn retry_last_message(
        &self,
        state: &mut ChatState,
        driver: &mut EffectDriver,
    ) -> Result<Option<ChatResponse>, ServiceError> {
        if state.messages.len() < 2 {
            return Ok(None);
        }
        let Some(content) = state
            .messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| message.content.clone())
        else {
            return Ok(None);
        };

        Self::step(state, driver, ChatAction::DropTrailingAssistant)?;
        self.send_message(state, driver, &content).await.map(Some)
    }

    fn build_request(&self, state: &ChatState, content: &str) -> Result<ChatRequest, ServiceError> {
        ChatRequest::new(ChatRequestParams {
            message: content.trim().to_string(),
            chat_id: state
                .current_conversation()
                .and_then(|conversation| conversation.chat_id.clone()),
            provider: state.selected_provider.clone(),
            model: state.selected_model.clone(),
            ..Default::default()
        })
    }
}

/// Token usage recorded with an assistant reply.
pub fn message_usage(message: &Message) -> Option<&Value> {
    message.metadata.as_ref()?.get("usage")
}
