//! Chat endpoints: sending messages and managing server-side conversations.

use crate::api::{ApiClient, ErrorHandler, RequestOptions, RetryPolicy, ServiceError};
use crate::services::SuccessResponse;
use crate::utils::time::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Base delay between chat send attempts.
pub const SEND_BASE_DELAY: Duration = Duration::from_millis(1500);
const DEFAULT_SEND_RETRIES: u32 = 2;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Conversation summary as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Caller-facing input for [`ChatRequest::new`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequestParams {
    pub message: String,
    pub chat_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

/// A validated `POST /chat` body.
///
/// The message is non-empty, the temperature lies in `[0, 2]` and the token
/// limit is at least one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(params: ChatRequestParams) -> Result<Self, ServiceError> {
        if params.message.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "Message content is required".to_string(),
            ));
        }

        Ok(Self {
            message: params.message,
            chat_id: params.chat_id.filter(|id| !id.is_empty()),
            provider: params.provider,
            model: params.model,
            temperature: params
                .temperature
                .map(|value| value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)),
            max_tokens: params.max_tokens.map(|tokens| tokens.max(1)),
            system_prompt: params.system_prompt,
        })
    }

    /// Shorthand for a bare message with backend defaults.
    pub fn message(message: impl Into<String>) -> Result<Self, ServiceError> {
        Self::new(ChatRequestParams {
            message: message.into(),
            ..Default::default()
        })
    }

    pub fn text(&self) -> &str {
        &self.message
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub chat_id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_executions: Option<Vec<ToolExecution>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub chat_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatListResponse {
    #[serde(default)]
    pub chats: Vec<Conversation>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

/// Partial update for `PUT /chat/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("Unknown export format: {other}")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Text => write!(f, "text"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    history: ChatHistory,
}

#[derive(Deserialize)]
struct CreatedChat {
    chat_id: String,
}

#[derive(Deserialize)]
struct ChatsEnvelope {
    #[serde(default)]
    chats: Vec<Conversation>,
}

#[derive(Debug, Clone)]
pub struct ChatService {
    client: Arc<ApiClient>,
    send_policy: RetryPolicy,
}

impl ChatService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            send_policy: RetryPolicy::new(DEFAULT_SEND_RETRIES, SEND_BASE_DELAY),
        }
    }

    /// Overrides the retry policy used by [`ChatService::send_message`].
    pub fn with_send_policy(self, send_policy: RetryPolicy) -> Self {
        Self {
            send_policy,
            ..self
        }
    }

    pub fn send_policy(&self) -> RetryPolicy {
        self.send_policy
    }

    /// `POST /chat`, retried on transient failures.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
        debug!(
            chat_id = ?request.chat_id(),
            provider = ?request.provider(),
            model = ?request.model(),
            "Sending chat request"
        );

        let response = self
            .send_policy
            .run(|| self.client.post::<ChatResponse, _>("/chat", request))
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to send message"))?;

        debug!(chat_id = %response.data.chat_id, "Chat response received");
        Ok(response.data)
    }

    pub async fn get_chat_history(&self, chat_id: &str) -> Result<ChatHistory, ServiceError> {
        let response = self
            .client
            .get::<HistoryEnvelope>(&format!("/chat/history/{chat_id}"))
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to load chat history"))?;
        Ok(response.data.history)
    }

    /// Paged conversation list; paging travels as query parameters.
    pub async fn get_chat_list(&self, page: u32, limit: u32) -> Result<ChatListResponse, ServiceError> {
        let options = RequestOptions {
            query: vec![
                ("page".to_string(), page.to_string()),
                ("limit".to_string(), limit.to_string()),
            ],
            ..Default::default()
        };
        let response = self
            .client
            .get_with::<ChatListResponse>("/chat/history", options)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to load chat list"))?;
        Ok(response.data)
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .delete::<SuccessResponse>(&format!("/chat/delete/{chat_id}"))
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to delete chat"))?;
        Ok(response.data.success)
    }

    pub async fn update_chat(&self, chat_id: &str, updates: &ChatUpdate) -> Result<bool, ServiceError> {
        let response = self
            .client
            .put::<SuccessResponse, _>(&format!("/chat/{chat_id}"), updates)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to update chat"))?;
        Ok(response.data.success)
    }

    /// Creates an empty conversation and returns its id.
    pub async fn create_chat(
        &self,
        title: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, ServiceError> {
        let body = serde_json::json!({ "title": title, "metadata": metadata });
        let response = self
            .client
            .post::<CreatedChat, _>("/chat/new", &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to create chat"))?;
        Ok(response.data.chat_id)
    }

    pub async fn export_chat(&self, chat_id: &str, format: ExportFormat) -> Result<String, ServiceError> {
        let history = self.get_chat_history(chat_id).await?;

        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&history)
                .map_err(|err| ErrorHandler::handle(err, "Failed to export chat")),
            ExportFormat::Text => Ok(render_history_text(&history)),
        }
    }

    pub async fn search_chats(&self, query: &str, limit: u32) -> Result<Vec<Conversation>, ServiceError> {
        let body = serde_json::json!({ "query": query, "limit": limit });
        let response = self
            .client
            .post::<ChatsEnvelope, _>("/chat/search", &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to search chats"))?;
        Ok(response.data.chats)
    }
}

/// Plain-text transcript used by [`ExportFormat::Text`].
pub fn render_history_text(history: &ChatHistory) -> String {
    let mut output = format!(
        "Chat: {}\nCreated: {}\nMessages: {}\n\n",
        history.title.as_deref().unwrap_or("Untitled"),
        history.created_at.to_rfc3339(),
        history.messages.len()
    );

    for message in &history.messages {
        let role = match message.role {
            MessageRole::User => "You",
            _ => "Assistant",
        };
        output.push_str(&format!(
            "[{}] {}:\n{}\n\n",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            role,
            message.content
        ));
    }

    output
}
