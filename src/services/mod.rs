//! Endpoint façades over the shared [`ApiClient`](crate::api::ApiClient).
//!
//! Every method follows the same template: call one backend endpoint, decode
//! the payload (timestamps become `DateTime<Utc>`), and on failure return
//! whatever [`ErrorHandler::handle`](crate::api::ErrorHandler::handle) makes of
//! the error under a method-specific context.

pub mod chat;
pub mod factory;
pub mod health;
pub mod mcp;
pub mod metrics;
pub mod providers;
pub mod system_prompts;

use serde::Deserialize;

pub use chat::ChatService;
pub use factory::{ServiceFactory, ServiceLocator};
pub use health::{HealthCheck, ServiceHealthMonitor};
pub use mcp::McpService;
pub use metrics::ServiceMetricsCollector;
pub use providers::ProviderService;
pub use system_prompts::SystemPromptService;

/// `{"success": bool}` acknowledgement returned by mutating endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}
