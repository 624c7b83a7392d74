//! Client-side view of the MCP tool catalogue.

use crate::api::ServiceError;
use crate::services::mcp::{McpServer, McpTool, McpToolExample, McpToolSchema, ServerStatus};
use crate::services::McpService;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Grouping inferred from a tool's name and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolCategory {
    FileSystem,
    VersionControl,
    WebApis,
    Database,
    Search,
    DataProcessing,
    General,
}

impl ToolCategory {
    pub fn infer(tool: &McpTool) -> Self {
        let name = tool.name.to_lowercase();
        let description = tool.description.to_lowercase();
        let name_has = |needles: &[&str]| needles.iter().any(|needle| name.contains(needle));
        let description_has = |needle: &str| description.contains(needle);

        if name_has(&["file", "read", "write"]) || description_has("file") {
            ToolCategory::FileSystem
        } else if name_has(&["git", "repo"]) || description_has("git") {
            ToolCategory::VersionControl
        } else if name_has(&["web", "http", "url"]) || description_has("web") {
            ToolCategory::WebApis
        } else if name_has(&["db", "database"]) || description_has("database") {
            ToolCategory::Database
        } else if name_has(&["search", "find"]) || description_has("search") {
            ToolCategory::Search
        } else if name_has(&["analysis", "process"]) || description_has("analy") {
            ToolCategory::DataProcessing
        } else {
            ToolCategory::General
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolCategory::FileSystem => "File System",
            ToolCategory::VersionControl => "Version Control",
            ToolCategory::WebApis => "Web & APIs",
            ToolCategory::Database => "Database",
            ToolCategory::Search => "Search & Discovery",
            ToolCategory::DataProcessing => "Data Processing",
            ToolCategory::General => "General",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct McpToolManager {
    service: Arc<McpService>,
    tools: Vec<McpTool>,
    servers: Vec<McpServer>,
}

impl McpToolManager {
    pub fn new(service: Arc<McpService>) -> Self {
        Self {
            service,
            tools: Vec::new(),
            servers: Vec::new(),
        }
    }

    /// Loads tools and servers concurrently.
    pub async fn initialize(&mut self) -> Result<(), ServiceError> {
        let (tools, servers) =
            tokio::try_join!(self.service.get_tools(), self.service.get_servers())?;
        self.replace_catalogue(tools, servers);
        Ok(())
    }

    pub fn replace_catalogue(&mut self, tools: Vec<McpTool>, servers: Vec<McpServer>) {
        self.tools = tools;
        self.servers = servers;
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn tools_by_server(&self) -> BTreeMap<&str, Vec<&McpTool>> {
        let mut grouped: BTreeMap<&str, Vec<&McpTool>> = BTreeMap::new();
        for tool in &self.tools {
            grouped.entry(tool.server.as_str()).or_default().push(tool);
        }
        grouped
    }

    pub fn tools_by_category(&self) -> BTreeMap<ToolCategory, Vec<&McpTool>> {
        let mut grouped: BTreeMap<ToolCategory, Vec<&McpTool>> = BTreeMap::new();
        for tool in &self.tools {
            grouped.entry(ToolCategory::infer(tool)).or_default().push(tool);
        }
        grouped
    }

    /// Case-insensitive match on name or description.
    pub fn search_tools(&self, query: &str) -> Vec<&McpTool> {
        let query = query.to_lowercase();
        self.tools
            .iter()
            .filter(|tool| {
                tool.name.to_lowercase().contains(&query)
                    || tool.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn tool(&self, name: &str) -> Option<&McpTool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn server_tools(&self, server: &str) -> Vec<&McpTool> {
        self.tools.iter().filter(|tool| tool.server == server).collect()
    }

    /// The tool exists and its server is connected.
    pub fn is_tool_available(&self, name: &str) -> bool {
        let Some(tool) = self.tool(name) else {
            return false;
        };
        self.servers
            .iter()
            .find(|server| server.name == tool.server)
            .is_some_and(|server| server.status == ServerStatus::Connected)
    }

    pub fn tool_examples(&self, name: &str) -> &[McpToolExample] {
        self.tool(name)
            .map(|tool| tool.examples.as_slice())
            .unwrap_or_default()
    }

    /// Checks `input` against the tool's schema.
    ///
    /// Fields the schema does not declare are reported as unknown.
    pub fn validate_tool_input(
        &self,
        name: &str,
        input: &Map<String, Value>,
    ) -> Result<(), Vec<String>> {
        let tool = self
            .tool(name)
            .ok_or_else(|| vec!["Tool not found".to_string()])?;

        let mut errors = Vec::new();
        let instance = Value::Object(input.clone());
        match jsonschema::validator_for(&schema_document(&tool.schema)) {
            Ok(validator) => {
                errors.extend(validator.iter_errors(&instance).map(|err| err.to_string()));
            }
            Err(err) => errors.push(format!("Invalid tool schema: {err}")),
        }
        errors.extend(
            input
                .keys()
                .filter(|field| !tool.schema.properties.contains_key(*field))
                .map(|field| format!("Unknown field '{field}'")),
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// JSON Schema for a tool's input. Empty property types are left open.
fn schema_document(schema: &McpToolSchema) -> Value {
    let properties: Map<String, Value> = schema
        .properties
        .iter()
        .map(|(name, property)| {
            let mut rule = Map::new();
            if !property.kind.is_empty() {
                rule.insert("type".to_string(), json!(property.kind));
            }
            if let Some(allowed) = &property.allowed {
                rule.insert("enum".to_string(), json!(allowed));
            }
            (name.clone(), Value::Object(rule))
        })
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": schema.required,
    })
}
