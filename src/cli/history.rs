use std::error::Error;

use chrono::Utc;

use crate::cli::context::CliContext;
use crate::cli::HistoryCommands;
use crate::core::session::ChatSession;
use crate::core::state::chat::{self, ChatAction, LocalConversation};
use crate::services::chat::{ChatUpdate, Conversation, Message, MessageRole};

pub async fn run(context: &mut CliContext, command: HistoryCommands) -> Result<(), Box<dyn Error>> {
    let service = context.factory.chat_service();

    match command {
        HistoryCommands::List { page, limit } => {
            let list = context
                .track("chat", service.get_chat_list(page, limit))
                .await?;
            if list.chats.is_empty() {
                println!("No conversations on page {page}.");
                return Ok(());
            }
            for conversation in &list.chats {
                println!("{}", format_conversation(conversation));
            }
            println!("Page {} · {} of {} conversations", list.page, list.chats.len(), list.total);
            Ok(())
        }
        HistoryCommands::Show { chat_id } => {
            let mut session = ChatSession::new(service, None);
            context
                .track("chat", session.load_conversation(&chat_id))
                .await?;
            let show_timestamps = context.settings.platform.show_timestamps;
            for message in session.messages() {
                println!("{}", format_message(message, show_timestamps));
            }
            Ok(())
        }
        HistoryCommands::Delete { chat_id } => {
            if context.track("chat", service.delete_chat(&chat_id)).await? {
                println!("✅ Deleted {chat_id}");
                Ok(())
            } else {
                Err(format!("The backend did not delete {chat_id}").into())
            }
        }
        HistoryCommands::Rename { chat_id, title } => {
            let update = ChatUpdate {
                title: Some(title.join(" ")),
                metadata: None,
            };
            if context
                .track("chat", service.update_chat(&chat_id, &update))
                .await?
            {
                println!("✅ Renamed {chat_id}");
                Ok(())
            } else {
                Err(format!("The backend did not rename {chat_id}").into())
            }
        }
        HistoryCommands::Export { chat_id, format } => {
            let exported = context
                .track("chat", service.export_chat(&chat_id, format))
                .await?;
            println!("{exported}");
            Ok(())
        }
        HistoryCommands::Search { query, limit } => {
            let found = context
                .track("chat", service.search_chats(&query, limit))
                .await?;
            if found.is_empty() {
                println!("No conversations match \"{query}\".");
            }
            for conversation in &found {
                println!("{}", format_conversation(conversation));
            }
            Ok(())
        }
        HistoryCommands::Local => {
            let state = context.chat_state()?;
            if !state.save_history {
                println!("⚠️  History saving is turned off (llmdesk settings set save-history true)");
            }
            let history = state.conversation_history();
            if history.is_empty() {
                println!("No conversations saved on this device.");
            }
            for conversation in history {
                println!("{}", format_local(conversation));
            }
            Ok(())
        }
        HistoryCommands::Forget { id } => {
            let state = context.chat_state()?;
            if !state.conversations.iter().any(|conversation| conversation.id == id) {
                return Err(format!("No local conversation with id {id}").into());
            }
            context.commit(chat::apply(state, ChatAction::DeleteConversation(id.clone()), Utc::now()))?;
            println!("✅ Forgot {id}");
            Ok(())
        }
        HistoryCommands::Clear => {
            let state = context.chat_state()?;
            let count = state.conversations.len();
            context.commit(chat::apply(state, ChatAction::ClearAll, Utc::now()))?;
            println!("✅ Removed {count} local conversations");
            Ok(())
        }
    }
}

pub(crate) fn format_conversation(conversation: &Conversation) -> String {
    format!(
        "  {:<36} {:<40} {:>4} msgs  {}",
        conversation.id,
        conversation.title.as_deref().unwrap_or("Untitled"),
        conversation.message_count,
        conversation.updated_at.format("%Y-%m-%d %H:%M")
    )
}

pub(crate) fn format_local(conversation: &LocalConversation) -> String {
    let model = match (&conversation.provider, &conversation.model) {
        (Some(provider), Some(model)) => format!("{provider}/{model}"),
        _ => "-".to_string(),
    };
    format!(
        "  {:<16} {:<40} {:>4} msgs  {:<32} {}",
        conversation.id,
        conversation.title,
        conversation.messages.len(),
        model,
        conversation.updated_at.format("%Y-%m-%d %H:%M")
    )
}

pub(crate) fn format_message(message: &Message, show_timestamp: bool) -> String {
    let role = match message.role {
        MessageRole::User => "You",
        MessageRole::Assistant => "Assistant",
        MessageRole::System => "System",
        MessageRole::Tool => "Tool",
    };
    if show_timestamp {
        format!(
            "[{}] {role}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.content
        )
    } else {
        format!("{role}: {}", message.content)
    }
}
