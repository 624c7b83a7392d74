//! A single backend conversation tracked client-side.

use crate::api::ServiceError;
use crate::services::chat::{ChatRequest, ChatRequestParams, ChatResponse, Message, MessageRole};
use crate::services::ChatService;
use crate::utils::ids::generate_id;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ChatSession {
    chat: Arc<ChatService>,
    conversation_id: Option<String>,
    messages: Vec<Message>,
    metadata: Map<String, Value>,
}

impl ChatSession {
    pub fn new(chat: Arc<ChatService>, conversation_id: Option<String>) -> Self {
        Self {
            chat,
            conversation_id,
            messages: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Replaces the session with the backend's copy of `chat_id`.
    pub async fn load_conversation(&mut self, chat_id: &str) -> Result<(), ServiceError> {
        let history = self.chat.get_chat_history(chat_id).await?;
        self.conversation_id = Some(chat_id.to_string());
        self.messages = history.messages;
        self.metadata = history.metadata.unwrap_or_default();
        Ok(())
    }

    pub async fn send_message(&mut self, content: &str) -> Result<ChatResponse, ServiceError> {
        self.send_with(ChatRequestParams {
            message: content.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Sends `params` within this conversation; `params.chat_id` is ignored.
    ///
    /// Both messages are recorded locally only once the backend has answered.
    pub async fn send_with(
        &mut self,
        params: ChatRequestParams,
    ) -> Result<ChatResponse, ServiceError> {
        let content = params.message.clone();
        let request = ChatRequest::new(ChatRequestParams {
            chat_id: self.conversation_id.clone(),
            ..params
        })?;

        let response = self.chat.send_message(&request).await?;
        self.conversation_id = Some(response.chat_id.clone());

        let now = Utc::now();
        self.messages.push(Message {
            id: generate_id(),
            role: MessageRole::User,
            content,
            timestamp: now,
            provider: None,
            model: None,
            metadata: None,
        });
        self.messages.push(Message {
            id: generate_id(),
            role: MessageRole::Assistant,
            content: response.response.clone(),
            timestamp: now,
            provider: Some(response.provider.clone()),
            model: Some(response.model.clone()),
            metadata: response.metadata.clone(),
        });

        Ok(response)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.conversation_id = None;
        self.metadata.clear();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}
