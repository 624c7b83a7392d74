//! llmdesk is a client for a multi-provider LLM chat platform backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] owns the HTTP transport, connection settings, retry policy and
//!   the normalized error model every backend call reports through.
//! - [`services`] wraps each backend area (chat, providers, MCP, system
//!   prompts) in a typed service and exposes the shared service factory,
//!   health monitor and call metrics.
//! - [`core`] keeps client-side state: pure state containers with their
//!   effects, local storage, the API key store, configuration, and helpers
//!   such as chat sessions, model selection and the MCP tool catalogue.
//! - [`cli`] parses arguments and drives the layers above for one command.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod services;
pub mod utils;
