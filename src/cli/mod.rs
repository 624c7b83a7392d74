//! Command-line interface parsing and handling
//!
//! Every subcommand loads a [`CliContext`], performs its backend calls through
//! the shared service factory and reports through notices on stdout/stderr.

pub mod context;
pub mod health;
pub mod history;
pub mod mcp;
pub mod prompts;
pub mod providers;
pub mod say;
pub mod settings;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::context::CliContext;
use crate::core::config::API_URL_ENV_VAR;
use crate::core::model_selector::UseCase;
use crate::services::chat::ExportFormat;
use crate::services::mcp::TransportType;
use crate::utils::logging;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ")"
);

#[derive(Parser)]
#[command(name = "llmdesk")]
#[command(version = VERSION)]
#[command(about = "A command-line client for a multi-provider LLM chat platform")]
#[command(
    long_about = "llmdesk talks to an LLM platform backend: it sends chat messages through \
any configured provider, browses chat history, manages providers, MCP tool servers and \
system prompts, and keeps local settings and conversations between runs.\n\n\
Backend URL (first match wins):\n\
  --api-url / LLMDESK_API_URL, base_url in the config file, the URL saved with \
'llmdesk settings set backend-url', the 'environment' preset.\n\n\
Authentication:\n\
  Use 'llmdesk auth set <key>' to store the backend API key in your system keyring.\n\n\
Logging:\n\
  -v enables debug output; LLMDESK_LOG accepts any tracing filter directive."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL for this run
    #[arg(long, global = true, env = API_URL_ENV_VAR, value_name = "URL")]
    pub api_url: Option<String>,

    /// Print debug logs to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check backend connectivity and the health of every service (default)
    Health,
    /// Send one message and print the reply
    Say {
        /// Provider to answer with (defaults to the saved default provider)
        #[arg(short = 'p', long)]
        provider: Option<String>,
        /// Model to answer with
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// Continue a local conversation instead of starting a new one
        #[arg(short = 'c', long, value_name = "ID")]
        conversation: Option<String>,
        /// Message to send
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Resend the last message of a local conversation
    Retry {
        /// Conversation to retry (defaults to the most recent one)
        conversation: Option<String>,
    },
    /// Browse and manage chat history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Inspect and manage LLM providers
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Inspect MCP servers and run their tools
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
    /// Manage system prompts
    Prompts {
        #[command(subcommand)]
        command: PromptCommands,
    },
    /// Store or remove the backend API key
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// View or change saved platform settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (default-model takes "<provider> <model>")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
        /// Provider, when unsetting default-model
        value: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List backend conversations
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Print a backend conversation
    Show { chat_id: String },
    /// Delete a backend conversation
    Delete { chat_id: String },
    /// Retitle a backend conversation
    Rename {
        chat_id: String,
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },
    /// Export a backend conversation
    Export {
        chat_id: String,
        /// text or json
        #[arg(short = 'f', long, default_value = "text")]
        format: ExportFormat,
    },
    /// Search backend conversations
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// List conversations kept on this device
    Local,
    /// Remove a conversation kept on this device
    Forget { id: String },
    /// Remove every conversation kept on this device
    Clear,
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List providers known to the backend
    List,
    /// List a provider's models (defaults to the saved default provider)
    Models { provider: Option<String> },
    /// Show provider health (all providers when none is named)
    Health { provider: Option<String> },
    /// Enable a provider
    Enable { provider: String },
    /// Disable a provider
    Disable { provider: String },
    /// Make a provider the backend default
    SetDefault { provider: String },
    /// Send a probe message through a provider
    Test {
        provider: String,
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// Probe message
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Suggest a model for a use case (chat, code, analysis, creative)
    Recommend {
        #[arg(default_value = "chat")]
        use_case: UseCase,
    },
    /// Show a provider's configuration with secrets redacted
    Config { provider: String },
    /// Validate and save provider configuration values
    Configure {
        provider: String,
        /// KEY=VALUE pairs
        #[arg(required = true, value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Show the MCP subsystem status
    Status,
    /// List MCP servers
    Servers,
    /// List tools, grouped by category
    Tools {
        /// Only tools of this server
        #[arg(long)]
        server: Option<String>,
        /// Only tools whose name or description matches
        #[arg(long)]
        search: Option<String>,
    },
    /// Validate input against a tool's schema and run it
    Run {
        tool: String,
        /// Tool input as a JSON object
        #[arg(short = 'i', long, default_value = "{}")]
        input: String,
        #[arg(long)]
        server: Option<String>,
    },
    /// Show recent tool executions
    Executions {
        #[arg(long, default_value_t = crate::services::mcp::DEFAULT_EXECUTION_LIMIT)]
        limit: u32,
    },
    /// Register a server
    Add {
        name: String,
        /// stdio, websocket or http
        #[arg(short = 't', long, default_value = "stdio")]
        transport: TransportType,
        /// Executable for stdio servers
        #[arg(long)]
        command: Option<String>,
        /// Argument passed to the executable (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Endpoint for websocket and http servers
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Test the connection to a server
    Test { server: String },
    /// Reconnect a server
    Reconnect { server: String },
    /// Disconnect a server
    Disconnect { server: String },
    /// Remove a server
    Remove { server: String },
}

#[derive(Subcommand)]
pub enum PromptCommands {
    /// List prompts by category
    List {
        #[arg(long)]
        category: Option<String>,
        /// Only prompts carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only the active prompt
        #[arg(long)]
        active: bool,
    },
    /// Show the active prompt
    Active,
    /// Print one prompt
    Show { id: String },
    /// Make a prompt the active one
    Activate { id: String },
    /// Search prompts on the backend
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Create a prompt from literal content or from structured parts
    Create {
        name: String,
        /// Literal prompt text; the structured options are ignored when set
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long = "expertise")]
        expertise: Vec<String>,
        #[arg(long = "instruction")]
        instructions: Vec<String>,
        #[arg(long = "constraint")]
        constraints: Vec<String>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Copy a prompt, optionally under a new name
    Duplicate { id: String, name: Option<String> },
    /// Delete a prompt
    Delete { id: String },
    /// List prompt templates
    Templates,
    /// Create a prompt from a template
    FromTemplate {
        template: String,
        name: String,
        /// KEY=VALUE template variables
        #[arg(value_parser = parse_key_value)]
        variables: Vec<(String, String)>,
    },
    /// Summarize the prompt library and its usage
    Stats,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store an API key
    Set { api_key: String },
    /// Remove the stored API key
    Clear,
    /// Report whether an API key is stored
    Status,
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print saved settings
    Show,
    /// Change one setting
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.verbose);

    match args.command {
        Some(Commands::Set { key, value }) => return settings::set_config(&key, &value),
        Some(Commands::Unset { key, value }) => {
            return settings::unset_config(&key, value.as_deref())
        }
        _ => {}
    }

    let mut context = CliContext::load(args.api_url.as_deref())?;
    let result = run(&mut context, args.command.unwrap_or(Commands::Health)).await;
    context.log_metrics();

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(context: &mut CliContext, command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Health => health::run_health(context).await,
        Commands::Say {
            provider,
            model,
            conversation,
            prompt,
        } => say::run_say(context, prompt, provider, model, conversation).await,
        Commands::Retry { conversation } => say::run_retry(context, conversation).await,
        Commands::History { command } => history::run(context, command).await,
        Commands::Providers { command } => providers::run(context, command).await,
        Commands::Mcp { command } => mcp::run(context, command).await,
        Commands::Prompts { command } => prompts::run(context, command).await,
        Commands::Auth { command } => settings::run_auth(context, command),
        Commands::Settings { command } => settings::run_settings(context, command),
        Commands::Set { .. } | Commands::Unset { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests;
