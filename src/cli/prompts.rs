use std::error::Error;

use crate::cli::context::CliContext;
use crate::cli::providers::config_map;
use crate::cli::PromptCommands;
use crate::core::prompt_manager::{
    BuiltPrompt, PromptFilter, SystemPromptBuilder, SystemPromptManager,
};
use crate::services::system_prompts::SystemPrompt;

const MISSING_PROMPT_PARTS: &str =
    "Give --content or at least one of --role, --instruction, --constraint, --context";

/// Structured pieces of a prompt given on the command line.
#[derive(Debug, Default)]
pub(crate) struct PromptParts {
    pub role: Option<String>,
    pub expertise: Vec<String>,
    pub instructions: Vec<String>,
    pub constraints: Vec<String>,
    pub context: Option<String>,
}

/// `None` when no part was given.
pub(crate) fn compose(parts: PromptParts) -> Option<BuiltPrompt> {
    let mut builder = SystemPromptBuilder::new();
    let mut used = false;
    if let Some(role) = &parts.role {
        builder = builder.role(role, &parts.expertise);
        used = true;
    }
    if !parts.instructions.is_empty() {
        builder = builder.instructions(&parts.instructions);
        used = true;
    }
    if let Some(context) = &parts.context {
        builder = builder.context(context);
        used = true;
    }
    if !parts.constraints.is_empty() {
        builder = builder.constraints(&parts.constraints);
        used = true;
    }
    used.then(|| builder.build())
}

pub async fn run(context: &mut CliContext, command: PromptCommands) -> Result<(), Box<dyn Error>> {
    let service = context.factory.system_prompt_service();

    match command {
        PromptCommands::List {
            category,
            tags,
            active,
        } => {
            let mut manager = SystemPromptManager::new(service);
            context.track("systemPrompt", manager.initialize()).await?;
            let filter = PromptFilter {
                category,
                tags,
                is_active: active.then_some(true),
                ..Default::default()
            };
            let shown: Vec<&str> = manager
                .search(&filter)
                .into_iter()
                .map(|prompt| prompt.id.as_str())
                .collect();
            if shown.is_empty() {
                println!("No system prompts found.");
                return Ok(());
            }
            for category in manager.categories() {
                let prompts: Vec<_> = category
                    .prompts
                    .iter()
                    .filter(|prompt| shown.contains(&prompt.id.as_str()))
                    .collect();
                if prompts.is_empty() {
                    continue;
                }
                println!("{} ({})", category.name, category.description);
                for prompt in prompts {
                    println!("{}", format_prompt(prompt));
                }
            }
            Ok(())
        }
        PromptCommands::Active => {
            let active = context
                .track("systemPrompt", service.get_active_prompt())
                .await?;
            if let Some(id) = &active.prompt_id {
                eprintln!("Active prompt: {id}");
            }
            println!("{}", active.prompt);
            Ok(())
        }
        PromptCommands::Show { id } => {
            let prompt = context
                .track("systemPrompt", service.get_prompt(&id))
                .await?;
            println!("{}", format_prompt(&prompt));
            if let Some(description) = &prompt.description {
                println!("{description}");
            }
            println!();
            println!("{}", prompt.content);
            Ok(())
        }
        PromptCommands::Activate { id } => {
            if context
                .track("systemPrompt", service.activate_prompt(&id))
                .await?
            {
                println!("✅ Activated {id}");
                Ok(())
            } else {
                Err(format!("The backend did not activate {id}").into())
            }
        }
        PromptCommands::Search {
            query,
            category,
            tags,
        } => {
            let found = context
                .track(
                    "systemPrompt",
                    service.search_prompts(&query, category.as_deref(), &tags),
                )
                .await?;
            if found.is_empty() {
                println!("No system prompts match \"{query}\".");
            }
            for prompt in &found {
                println!("{}", format_prompt(prompt));
            }
            Ok(())
        }
        PromptCommands::Create {
            name,
            content,
            role,
            expertise,
            instructions,
            constraints,
            context: prompt_context,
            category,
        } => {
            let mut new_prompt = match content {
                Some(content) => BuiltPrompt {
                    content,
                    metadata: Default::default(),
                }
                .into_new_prompt(name),
                None => compose(PromptParts {
                    role,
                    expertise,
                    instructions,
                    constraints,
                    context: prompt_context,
                })
                .ok_or(MISSING_PROMPT_PARTS)?
                .into_new_prompt(name),
            };
            new_prompt.category = category;
            let created = context
                .track("systemPrompt", service.create_prompt(&new_prompt))
                .await?;
            println!("✅ Created {} ({})", created.name, created.id);
            Ok(())
        }
        PromptCommands::Duplicate { id, name } => {
            let copy = context
                .track("systemPrompt", service.duplicate_prompt(&id, name.as_deref()))
                .await?;
            println!("✅ Created {} ({})", copy.name, copy.id);
            Ok(())
        }
        PromptCommands::Delete { id } => {
            if context
                .track("systemPrompt", service.delete_prompt(&id))
                .await?
            {
                println!("✅ Deleted {id}");
                Ok(())
            } else {
                Err(format!("The backend did not delete {id}").into())
            }
        }
        PromptCommands::Templates => {
            let templates = context
                .track("systemPrompt", service.get_templates())
                .await?;
            for template in &templates {
                let variables: Vec<_> = template
                    .variables
                    .iter()
                    .map(|variable| {
                        if variable.required {
                            format!("{}*", variable.name)
                        } else {
                            variable.name.clone()
                        }
                    })
                    .collect();
                println!(
                    "  {:<24} [{}] {} ({})",
                    template.name,
                    template.category,
                    template.description,
                    variables.join(", ")
                );
            }
            Ok(())
        }
        PromptCommands::FromTemplate {
            template,
            name,
            variables,
        } => {
            let variables = config_map(variables);
            let created = context
                .track(
                    "systemPrompt",
                    service.create_from_template(&template, &variables, &name),
                )
                .await?;
            println!("✅ Created {} ({})", created.name, created.id);
            Ok(())
        }
        PromptCommands::Stats => {
            let mut manager = SystemPromptManager::new(service.clone());
            context.track("systemPrompt", manager.initialize()).await?;
            let stats = manager.statistics();
            println!(
                "{} prompts, {} active, {:.1} uses on average",
                stats.total, stats.active_count, stats.average_usage
            );
            for (category, count) in &stats.by_category {
                println!("  {category:<16} {count}");
            }

            println!("Most used:");
            for prompt in manager.most_used(5) {
                println!("  {:<32} {} uses", prompt.name, prompt.usage_count);
            }
            println!("Newest:");
            for prompt in manager.recent(5) {
                println!("  {:<32} {}", prompt.name, prompt.created_at.format("%Y-%m-%d"));
            }

            let usage = context
                .track("systemPrompt", service.get_usage_stats())
                .await?;
            if !usage.is_empty() {
                println!("Usage:");
            }
            for entry in &usage {
                println!(
                    "  {:<32} {:>5} uses  success rate {:.2}  {:.0} ms avg",
                    entry.prompt_name,
                    entry.usage_count,
                    entry.success_rate,
                    entry.average_response_time
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn format_prompt(prompt: &SystemPrompt) -> String {
    let marker = if prompt.is_active { "*" } else { " " };
    let mut line = format!("  {marker} {:<24} {}", prompt.id, prompt.name);
    if !prompt.tags.is_empty() {
        line.push_str(&format!(" #{}", prompt.tags.join(" #")));
    }
    line
}
