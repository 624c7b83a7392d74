//! Model Context Protocol endpoints: server lifecycle and tool execution.

use crate::api::{ApiClient, ErrorHandler, RequestOptions, ServiceError};
use crate::services::SuccessResponse;
use crate::utils::time::{iso_timestamp, iso_timestamp_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const DEFAULT_EXECUTION_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Connected,
    Disconnected,
    Connecting,
    #[serde(other)]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Stdio,
    Websocket,
    Http,
}

impl std::str::FromStr for TransportType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportType::Stdio),
            "websocket" | "ws" => Ok(TransportType::Websocket),
            "http" => Ok(TransportType::Http),
            other => Err(format!("Unknown transport type: {other}")),
        }
    }
}

/// Launch/connect parameters for one server. Which fields matter depends on
/// the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpToolProperty {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn object_type() -> String {
    "object".to_string()
}

/// Input schema of a tool, a restricted JSON Schema object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolSchema {
    #[serde(rename = "type", default = "object_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, McpToolProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for McpToolSchema {
    fn default() -> Self {
        Self {
            kind: object_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolExample {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub schema: McpToolSchema,
    #[serde(default)]
    pub examples: Vec<McpToolExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub status: ServerStatus,
    pub transport_type: TransportType,
    #[serde(default)]
    pub config: McpServerConfig,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(default, with = "iso_timestamp_opt")]
    pub last_connected: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpStatusResponse {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub active_servers: u32,
    #[serde(default)]
    pub total_servers: u32,
    #[serde(default)]
    pub total_tools: u32,
    #[serde(with = "iso_timestamp")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub servers: Vec<McpServer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolExecution {
    pub tool_name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of `POST /mcp/servers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMcpServer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub transport_type: TransportType,
    pub config: McpServerConfig,
}

/// Body of `PUT /mcp/servers/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct McpServerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<McpServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpServerTestResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub tools_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct ServersEnvelope {
    #[serde(default)]
    servers: Vec<McpServer>,
}

#[derive(Deserialize)]
struct ServerEnvelope {
    server: McpServer,
}

#[derive(Deserialize)]
struct ToolsEnvelope {
    #[serde(default)]
    tools: Vec<McpTool>,
}

#[derive(Deserialize)]
struct ExecutionsEnvelope {
    #[serde(default)]
    executions: Vec<McpToolExecution>,
}

#[derive(Debug, Clone)]
pub struct McpService {
    client: Arc<ApiClient>,
}

impl McpService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_status(&self) -> Result<McpStatusResponse, ServiceError> {
        let response = self
            .client
            .get::<McpStatusResponse>("/mcp/status")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get MCP status"))?;
        Ok(response.data)
    }

    pub async fn get_servers(&self) -> Result<Vec<McpServer>, ServiceError> {
        let response = self
            .client
            .get::<ServersEnvelope>("/mcp/servers")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get MCP servers"))?;
        Ok(response.data.servers)
    }

    pub async fn get_server(&self, server: &str) -> Result<McpServer, ServiceError> {
        let response = self
            .client
            .get::<ServerEnvelope>(&format!("/mcp/servers/{server}"))
            .await
            .map_err(|err| ErrorHandler::handle(err, &format!("Failed to get MCP server: {server}")))?;
        Ok(response.data.server)
    }

    pub async fn get_tools(&self) -> Result<Vec<McpTool>, ServiceError> {
        let response = self
            .client
            .get::<ToolsEnvelope>("/mcp/tools")
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get MCP tools"))?;
        Ok(response.data.tools)
    }

    pub async fn get_server_tools(&self, server: &str) -> Result<Vec<McpTool>, ServiceError> {
        let response = self
            .client
            .get::<ToolsEnvelope>(&format!("/mcp/servers/{server}/tools"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to get tools for server: {server}"))
            })?;
        Ok(response.data.tools)
    }

    pub async fn reconnect_server(&self, server: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .post_empty::<SuccessResponse>(&format!("/mcp/servers/{server}/reconnect"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to reconnect to server: {server}"))
            })?;
        Ok(response.data.success)
    }

    pub async fn disconnect_server(&self, server: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .post_empty::<SuccessResponse>(&format!("/mcp/servers/{server}/disconnect"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to disconnect from server: {server}"))
            })?;
        Ok(response.data.success)
    }

    pub async fn add_server(&self, server: &NewMcpServer) -> Result<bool, ServiceError> {
        let response = self
            .client
            .post::<SuccessResponse, _>("/mcp/servers", server)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to add MCP server"))?;
        Ok(response.data.success)
    }

    pub async fn update_server(&self, server: &str, updates: &McpServerUpdate) -> Result<bool, ServiceError> {
        let response = self
            .client
            .put::<SuccessResponse, _>(&format!("/mcp/servers/{server}"), updates)
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to update MCP server: {server}"))
            })?;
        Ok(response.data.success)
    }

    pub async fn remove_server(&self, server: &str) -> Result<bool, ServiceError> {
        let response = self
            .client
            .delete::<SuccessResponse>(&format!("/mcp/servers/{server}"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to remove MCP server: {server}"))
            })?;
        Ok(response.data.success)
    }

    /// Runs a tool directly on the backend, outside of a chat turn.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        input: &Map<String, Value>,
        server: Option<&str>,
    ) -> Result<McpToolExecution, ServiceError> {
        let body = serde_json::json!({
            "tool_name": tool_name,
            "input": input,
            "server": server,
        });
        let response = self
            .client
            .post::<McpToolExecution, _>("/mcp/tools/execute", &body)
            .await
            .map_err(|err| ErrorHandler::handle(err, &format!("Failed to execute tool: {tool_name}")))?;
        Ok(response.data)
    }

    pub async fn get_tool_executions(&self, limit: u32) -> Result<Vec<McpToolExecution>, ServiceError> {
        let options = RequestOptions {
            query: vec![("limit".to_string(), limit.to_string())],
            ..Default::default()
        };
        let response = self
            .client
            .get_with::<ExecutionsEnvelope>("/mcp/tools/executions", options)
            .await
            .map_err(|err| ErrorHandler::handle(err, "Failed to get tool executions"))?;
        Ok(response.data.executions)
    }

    pub async fn test_server(&self, server: &str) -> Result<McpServerTestResult, ServiceError> {
        let response = self
            .client
            .post_empty::<McpServerTestResult>(&format!("/mcp/servers/{server}/test"))
            .await
            .map_err(|err| {
                ErrorHandler::handle(err, &format!("Failed to test MCP server: {server}"))
            })?;
        Ok(response.data)
    }
}
