use std::error::Error;

use serde_json::{Map, Value};

use crate::cli::context::CliContext;
use crate::cli::McpCommands;
use crate::core::tool_manager::McpToolManager;
use crate::services::mcp::{McpServer, McpServerConfig, McpToolExecution, NewMcpServer, ServerStatus};

pub async fn run(context: &mut CliContext, command: McpCommands) -> Result<(), Box<dyn Error>> {
    let service = context.factory.mcp_service();

    match command {
        McpCommands::Status => {
            let status = context.track("mcp", service.get_status()).await?;
            let state = if status.enabled { "enabled" } else { "disabled" };
            println!(
                "MCP {state}: {}/{} servers active, {} tools (updated {})",
                status.active_servers,
                status.total_servers,
                status.total_tools,
                status.last_update.format("%Y-%m-%d %H:%M:%S")
            );
            Ok(())
        }
        McpCommands::Servers => {
            let servers = context.track("mcp", service.get_servers()).await?;
            if servers.is_empty() {
                println!("No MCP servers registered.");
            }
            for server in &servers {
                println!("{}", format_server(server));
            }
            Ok(())
        }
        McpCommands::Tools { server, search } => {
            let mut manager = McpToolManager::new(service);
            context.track("mcp", manager.initialize()).await?;

            let matches: Vec<_> = match &search {
                Some(query) => manager.search_tools(query),
                None => manager.tools().iter().collect(),
            };
            let shown: Vec<_> = matches
                .into_iter()
                .filter(|tool| server.as_deref().is_none_or(|name| tool.server == name))
                .map(|tool| tool.name.as_str())
                .collect();

            if shown.is_empty() {
                println!("No tools found.");
                return Ok(());
            }
            for (category, tools) in manager.tools_by_category() {
                let tools: Vec<_> = tools
                    .into_iter()
                    .filter(|tool| shown.contains(&tool.name.as_str()))
                    .collect();
                if tools.is_empty() {
                    continue;
                }
                println!("{category}:");
                for tool in tools {
                    let marker = if manager.is_tool_available(&tool.name) { "●" } else { "○" };
                    println!("  {marker} {:<28} [{}] {}", tool.name, tool.server, tool.description);
                }
            }
            Ok(())
        }
        McpCommands::Run {
            tool,
            input,
            server,
        } => {
            let input = parse_tool_input(&input)?;
            let mut manager = McpToolManager::new(service.clone());
            context.track("mcp", manager.initialize()).await?;

            if let Err(errors) = manager.validate_tool_input(&tool, &input) {
                for error in &errors {
                    eprintln!("  • {error}");
                }
                let examples = manager.tool_examples(&tool);
                if !examples.is_empty() {
                    eprintln!();
                    eprintln!("💡 Examples:");
                    for example in examples {
                        eprintln!("  {}: {}", example.name, Value::Object(example.input.clone()));
                    }
                }
                return Err(format!("Invalid input for {tool}").into());
            }
            if !manager.is_tool_available(&tool) {
                eprintln!("⚠️  The server providing {tool} is not connected");
            }

            let execution = context
                .track("mcp", service.execute_tool(&tool, &input, server.as_deref()))
                .await?;
            println!("{}", serde_json::to_string_pretty(&execution.output)?);
            if execution.success {
                eprintln!("✅ {tool} finished in {:.0} ms", execution.execution_time_ms);
                Ok(())
            } else {
                let reason = execution.error_message.unwrap_or_else(|| "no details".to_string());
                Err(format!("{tool} failed: {reason}").into())
            }
        }
        McpCommands::Executions { limit } => {
            let executions = context
                .track("mcp", service.get_tool_executions(limit))
                .await?;
            if executions.is_empty() {
                println!("No tool executions recorded.");
            }
            for execution in &executions {
                println!("{}", format_execution(execution));
            }
            Ok(())
        }
        McpCommands::Add {
            name,
            transport,
            command,
            args,
            url,
            display_name,
            description,
        } => {
            let server = NewMcpServer {
                name: name.clone(),
                display_name,
                description,
                transport_type: transport,
                config: McpServerConfig {
                    command,
                    args: (!args.is_empty()).then_some(args),
                    url,
                    ..Default::default()
                },
            };
            acknowledge(context.track("mcp", service.add_server(&server)).await?, &name, "added")
        }
        McpCommands::Test { server } => {
            let result = context.track("mcp", service.test_server(&server)).await?;
            let latency = result
                .latency_ms
                .map(|ms| format!(" in {ms:.0} ms"))
                .unwrap_or_default();
            if result.success {
                let tools = result.tools_count.unwrap_or(0);
                println!("✅ {server} responded{latency} with {tools} tools");
                Ok(())
            } else {
                let reason = result.error.unwrap_or_else(|| "no details".to_string());
                Err(format!("{server} test failed{latency}: {reason}").into())
            }
        }
        McpCommands::Reconnect { server } => acknowledge(
            context.track("mcp", service.reconnect_server(&server)).await?,
            &server,
            "reconnected",
        ),
        McpCommands::Disconnect { server } => acknowledge(
            context.track("mcp", service.disconnect_server(&server)).await?,
            &server,
            "disconnected",
        ),
        McpCommands::Remove { server } => acknowledge(
            context.track("mcp", service.remove_server(&server)).await?,
            &server,
            "removed",
        ),
    }
}

fn acknowledge(success: bool, server: &str, verb: &str) -> Result<(), Box<dyn Error>> {
    if success {
        println!("✅ {server} {verb}");
        Ok(())
    } else {
        Err(format!("The backend reported {server} was not {verb}").into())
    }
}

pub(crate) fn parse_tool_input(raw: &str) -> Result<Map<String, Value>, Box<dyn Error>> {
    match serde_json::from_str(raw)? {
        Value::Object(input) => Ok(input),
        _ => Err("Tool input must be a JSON object".into()),
    }
}

pub(crate) fn format_server(server: &McpServer) -> String {
    let status = match server.status {
        ServerStatus::Connected => "✅ connected",
        ServerStatus::Connecting => "⏳ connecting",
        ServerStatus::Disconnected => "○ disconnected",
        ServerStatus::Error => "❌ error",
    };
    let name = if server.display_name.is_empty() {
        &server.name
    } else {
        &server.display_name
    };
    let mut line = format!("  {:<20} {:<16} {} tools  {name}", server.name, status, server.tools.len());
    if let Some(error) = &server.error_message {
        line.push_str(&format!(" ({error})"));
    }
    line
}

pub(crate) fn format_execution(execution: &McpToolExecution) -> String {
    let outcome = if execution.success { "✅" } else { "❌" };
    format!(
        "  {} {outcome} {:<28} [{}] {:.0} ms",
        execution.timestamp.format("%Y-%m-%d %H:%M:%S"),
        execution.tool_name,
        execution.server,
        execution.execution_time_ms
    )
}
