//! System prompt library endpoints.

use crate::api::{ApiClient, ErrorHandler, RequestOptions, ServiceError};
use crate::services::SuccessResponse;
use crate::utils::time::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    String,
    Number,
    Boolean,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptVariable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<SystemPromptVariable>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemPromptsListResponse {
    #[serde(default)]
    pub prompts: Vec<SystemPrompt>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub active_prompt_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemPromptUsage {
    pub prompt_id: String,
    #[serde(default)]
    pub prompt_name: String,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(with = "iso_timestamp")]
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub average_response_time: f64,
}

/// Payload of `GET /system-prompt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivePrompt {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Body of `POST /system-prompts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewSystemPrompt {
    pub name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Body of `PUT /system-prompts/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemPromptUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct PromptEnvelope {
    prompt: SystemPrompt,
}

#[derive(Deserialize)]
struct PromptsEnvelope {
    #[serde(default)]
    prompts: Vec<SystemPrompt>,
}

#[derive(Deserialize)]
struct UsageEnvelope {
    #[serde(default)]
    usage: Vec<SystemPromptUsage>,
}

#[derive(Deserialize)]
struct TemplatesEnvelope {
    #[serde(default)]
    templates: Vec<SystemPromptTemplate>,
}

#[derive(Debug, Clone)]
pub struct SystemPromptService {
    client: Arc<ApiClient>,
}

impl SystemPromptService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_active_prompt(&self) -> Result<ActivePrompt, ServiceError> {
        let response = self
            .client
            .get::<ActivePrompt>("/system-prompt")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get active system prompt"))?;
        Ok(response.data)
    }

    pub async fn set_active_prompt(&self, prompt: &str) -> Result<bool, ServiceError> {
        let body = serde_json::json!({ "prompt": prompt });
        let response = self
            .client
            .post::<SuccessResponse, _>("/system-prompt", &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to set active system prompt"))?;
        Ok(response.data.success)
    }

    pub async fn get_prompts(&self) -> Result<SystemPromptsListResponse, ServiceError> {
        let response = self
            .client
            .get::<SystemPromptsListResponse>("/system-prompts")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get system prompts"))?;
        Ok(response.data)
    }

    pub async fn get_prompt(&self, prompt_id: &str) -> Result<SystemPrompt, ServiceError> {
        let response = self
            .client
            .get::<PromptEnvelope>(&format!("/system-prompts/{prompt_id}"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to get system prompt: {prompt_id}"))
            })?;
        Ok(response.data.prompt)
    }

    pub async fn create_prompt(&self, prompt: &NewSystemPrompt) -> Result<SystemPrompt, ServiceError> {
        let response = self
            .client
            .post::<PromptEnvelope, _>("/system-prompts", prompt)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to create system prompt"))?;
        Ok(response.data.prompt)
    }

    pub async fn update_prompt(
        &self,
        prompt_id: &str,
        updates: &SystemPromptUpdate,
    ) -> Result<SystemPrompt, ServiceError> {
        let response = self
            .client
            .put::<PromptEnvelope, _>(&format!("/system-prompts/{prompt_id}"), updates)
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to update system prompt: {prompt_id}"))
            })?;
        Ok(response.data.prompt)
    }

    pub async fn delete_prompt(&self, prompt_id: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .delete::<SuccessResponse>(&format!("/system-prompts/{prompt_id}"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to delete system prompt: {prompt_id}"))
            })?;
        Ok(response.data.success)
    }

    pub async fn activate_prompt(&self, prompt_id: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .post_empty::<SuccessResponse>(&format!("/system-prompts/{prompt_id}/activate"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to activate system prompt: {prompt_id}"))
            })?;
        Ok(response.data.success)
    }

    pub async fn duplicate_prompt(
        &self,
        prompt_id: &str,
        new_name: Option<&str>,
    ) -> Result<SystemPrompt, ServiceError> {
        let body = serde_json::json!({ "name": new_name });
        let response = self
            .client
            .post::<PromptEnvelope, _>(&format!("/system-prompts/{prompt_id}/duplicate"), &body)
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to duplicate system prompt: {prompt_id}"))
            })?;
        Ok(response.data.prompt)
    }

    pub async fn get_usage_stats(&self) -> Result<Vec<SystemPromptUsage>, ServiceError> {
        let response = self
            .client
            .get::<UsageEnvelope>("/system-prompts/usage")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get system prompt usage stats"))?;
        Ok(response.data.usage)
    }

    /// `tags` are sent as repeated `tags=` parameters.
    pub async fn search_prompts(
        &self,
        query: &str,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<SystemPrompt>, ServiceError> {
        let mut params = vec![("query".to_string(), query.to_string())];
        if let Some(category) = category.filter(|category| !category.is_empty()) {
            params.push(("category".to_string(), category.to_string()));
        }
        params.extend(tags.iter().map(|tag| ("tags".to_string(), tag.clone())));

        let options = RequestOptions {
            query: params,
            ..Default::default()
        };
        let response = self
            .client
            .get_with::<PromptsEnvelope>("/system-prompts/search", options)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to search system prompts"))?;
        Ok(response.data.prompts)
    }

    pub async fn get_templates(&self) -> Result<Vec<SystemPromptTemplate>, ServiceError> {
        let response = self
            .client
            .get::<TemplatesEnvelope>("/system-prompts/templates")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get system prompt templates"))?;
        Ok(response.data.templates)
    }

    pub async fn create_from_template(
        &self,
        template: &str,
        variables: &Map<String, Value>,
        name: &str,
    ) -> Result<SystemPrompt, ServiceError> {
        let body = serde_json::json!({
            "template": template,
            "variables": variables,
            "name": name,
        });
        let response = self
            .client
            .post::<PromptEnvelope, _>("/system-prompts/from-template", &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to create prompt from template"))?;
        Ok(response.data.prompt)
    }
}
