//! Composing and organizing system prompts.

use crate::api::ServiceError;
use crate::services::system_prompts::{NewSystemPrompt, SystemPrompt};
use crate::services::SystemPromptService;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds prompt text section by section. Each step consumes and returns the
/// builder.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptBuilder {
    parts: Vec<String>,
    metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl BuiltPrompt {
    /// Creation payload for the backend.
    pub fn into_new_prompt(self, name: impl Into<String>) -> NewSystemPrompt {
        NewSystemPrompt {
            name: name.into(),
            content: self.content,
            metadata: (!self.metadata.is_empty()).then_some(self.metadata),
            ..Default::default()
        }
    }
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, title: &str, content: &str) -> Self {
        self.parts.push(format!("## {title}\n\n{content}\n"));
        self
    }

    /// Numbered instructions.
    pub fn instructions<S: AsRef<str>>(mut self, instructions: &[S]) -> Self {
        self.parts.push("## Instructions\n".to_string());
        for (index, instruction) in instructions.iter().enumerate() {
            self.parts.push(format!("{}. {}", index + 1, instruction.as_ref()));
        }
        self.parts.push("\n".to_string());
        self
    }

    /// Role preamble; always placed first.
    pub fn role<S: AsRef<str>>(mut self, role: &str, expertise: &[S]) -> Self {
        let expertise = expertise
            .iter()
            .map(|item| format!("- {}", item.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        self.parts.insert(
            0,
            format!("You are {role}.\n\nYour expertise includes:\n{expertise}\n\n"),
        );
        self
    }

    pub fn context(mut self, context: &str) -> Self {
        self.parts.push(format!("## Context\n\n{context}\n"));
        self
    }

    /// Bulleted guidelines.
    pub fn constraints<S: AsRef<str>>(mut self, constraints: &[S]) -> Self {
        self.parts.push("## Guidelines\n".to_string());
        for constraint in constraints {
            self.parts.push(format!("- {}", constraint.as_ref()));
        }
        self.parts.push("\n".to_string());
        self
    }

    /// `(input, output)` pairs.
    pub fn examples(mut self, examples: &[(&str, &str)]) -> Self {
        self.parts.push("## Examples\n".to_string());
        for (index, (input, output)) in examples.iter().enumerate() {
            self.parts.push(format!("### Example {}", index + 1));
            self.parts.push(format!("**Input:** {input}"));
            self.parts.push(format!("**Output:** {output}\n"));
        }
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(&self) -> BuiltPrompt {
        BuiltPrompt {
            content: self.parts.join("\n"),
            metadata: self.metadata.clone(),
        }
    }

    pub fn reset(self) -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptCategory {
    pub name: String,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub prompts: Vec<SystemPrompt>,
}

impl PromptCategory {
    fn new(name: &str, prompts: Vec<SystemPrompt>) -> Self {
        let (description, color, icon) = match name.to_lowercase().as_str() {
            "general" => (
                "General purpose prompts for everyday conversations",
                "blue",
                "chat-bubble-left-right",
            ),
            "consulting" => ("Business and consulting focused prompts", "green", "briefcase"),
            "technical" => (
                "Technical and development related prompts",
                "purple",
                "code-bracket",
            ),
            "creative" => (
                "Creative writing and content generation prompts",
                "pink",
                "sparkles",
            ),
            "analysis" => ("Data analysis and research prompts", "orange", "chart-bar"),
            "support" => ("Customer support and help desk prompts", "teal", "lifebuoy"),
            _ => ("Custom category prompts", "gray", "document-text"),
        };
        Self {
            name: name.to_string(),
            description,
            color,
            icon,
            prompts,
        }
    }
}

/// Filters for [`SystemPromptManager::search`]; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    pub query: Option<String>,
    pub category: Option<String>,
    /// Matches prompts carrying any of these tags.
    pub tags: Vec<String>,
    pub is_active: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptStatistics {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub active_count: usize,
    pub average_usage: f64,
}

/// Local copy of the prompt library with grouping and search.
#[derive(Debug, Clone)]
pub struct SystemPromptManager {
    service: Arc<SystemPromptService>,
    prompts: Vec<SystemPrompt>,
}

impl SystemPromptManager {
    pub fn new(service: Arc<SystemPromptService>) -> Self {
        Self {
            service,
            prompts: Vec::new(),
        }
    }

    pub async fn initialize(&mut self) -> Result<(), ServiceError> {
        let response = self.service.get_prompts().await?;
        self.prompts = response.prompts;
        Ok(())
    }

    pub fn replace_prompts(&mut self, prompts: Vec<SystemPrompt>) {
        self.prompts = prompts;
    }

    pub fn prompts(&self) -> &[SystemPrompt] {
        &self.prompts
    }

    /// Categories in order of first appearance.
    pub fn categories(&self) -> Vec<PromptCategory> {
        let mut order: Vec<&str> = Vec::new();
        let mut grouped: BTreeMap<&str, Vec<SystemPrompt>> = BTreeMap::new();
        for prompt in &self.prompts {
            let bucket = grouped.entry(prompt.category.as_str()).or_insert_with(|| {
                order.push(prompt.category.as_str());
                Vec::new()
            });
            bucket.push(prompt.clone());
        }
        order
            .into_iter()
            .map(|name| PromptCategory::new(name, grouped.remove(name).unwrap_or_default()))
            .collect()
    }

    pub fn prompts_in_category(&self, category: &str) -> Vec<&SystemPrompt> {
        self.prompts
            .iter()
            .filter(|prompt| prompt.category == category)
            .collect()
    }

    pub fn most_used(&self, limit: usize) -> Vec<&SystemPrompt> {
        let mut ranked: Vec<_> = self.prompts.iter().collect();
        ranked.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        ranked.truncate(limit);
        ranked
    }

    pub fn recent(&self, limit: usize) -> Vec<&SystemPrompt> {
        let mut ranked: Vec<_> = self.prompts.iter().collect();
        ranked.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ranked.truncate(limit);
        ranked
    }

    pub fn search(&self, filter: &PromptFilter) -> Vec<&SystemPrompt> {
        let query = filter
            .query
            .as_deref()
            .filter(|query| !query.is_empty())
            .map(str::to_lowercase);

        self.prompts
            .iter()
            .filter(|prompt| {
                query.as_deref().is_none_or(|query| {
                    prompt.name.to_lowercase().contains(query)
                        || prompt
                            .description
                            .as_deref()
                            .is_some_and(|description| description.to_lowercase().contains(query))
                        || prompt.content.to_lowercase().contains(query)
                })
            })
            .filter(|prompt| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|category| prompt.category == category)
            })
            .filter(|prompt| {
                filter.tags.is_empty() || filter.tags.iter().any(|tag| prompt.tags.contains(tag))
            })
            .filter(|prompt| filter.is_active.is_none_or(|active| prompt.is_active == active))
            .filter(|prompt| {
                filter
                    .created_after
                    .is_none_or(|after| prompt.created_at > after)
            })
            .collect()
    }

    pub fn statistics(&self) -> PromptStatistics {
        let mut by_category = BTreeMap::new();
        let mut total_usage = 0_u64;
        for prompt in &self.prompts {
            *by_category.entry(prompt.category.clone()).or_insert(0) += 1;
            total_usage += prompt.usage_count;
        }

        let total = self.prompts.len();
        PromptStatistics {
            total,
            by_category,
            active_count: self.prompts.iter().filter(|prompt| prompt.is_active).count(),
            average_usage: if total > 0 {
                total_usage as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}
