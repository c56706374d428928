//! Slash commands for interactive mode
//!
//! Parsing is pure: a command only inspects [`CommandContext`] and returns a
//! [`CommandResult`] for the main loop to carry out.

mod chats;
mod messages;
mod model;
mod thinking;

pub use chats::ChatsCommand;
pub use messages::MessageCommand;
pub use model::ModelCommand;
pub use thinking::ThinkingCommand;

use prism_ai::{Chat, Message, ModelInfo, ReasoningLevel};

/// What a command may look at
pub struct CommandContext<'a> {
    pub messages: &'a [Message],
    /// Chat list as last shown, newest first
    pub chats: &'a [Chat],
    pub model: &'a str,
    pub reasoning: ReasoningLevel,
}

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
    /// Start an empty chat
    NewChat,
    ListChats,
    /// Open the chat at this position of the chat list
    OpenChat(usize),
    RenameChat(String),
    /// Delete the chat at this position, or the current chat
    DeleteChat(Option<usize>),
    ListMessages,
    Edit { index: usize, text: String },
    Retry(usize),
    Delete(usize),
    Branch(usize),
    ChangeModel(&'static ModelInfo),
    ChangeReasoning(ReasoningLevel),
    Resync,
    /// Attach a file by URL to the next message
    Attach { url: String },
    /// Drop all attachments from the next message
    Detach,
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(' ') {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    let command = command.to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "new" | "n" => CommandResult::NewChat,

        "chats" | "ls" => CommandResult::ListChats,

        "open" | "o" => ChatsCommand::open(args, ctx),

        "rename" => ChatsCommand::rename(args),

        "close" | "rm-chat" => ChatsCommand::delete(args, ctx),

        "messages" | "msgs" => CommandResult::ListMessages,

        "edit" | "e" => MessageCommand::edit(args, ctx),

        "retry" | "r" => MessageCommand::retry(args, ctx),

        "delete" | "d" => MessageCommand::delete(args, ctx),

        "branch" | "b" => MessageCommand::branch(args, ctx),

        "model" | "m" => ModelCommand::execute(args, ctx.model),

        "thinking" | "t" => ThinkingCommand::execute(args, ctx.reasoning),

        "resync" => CommandResult::Resync,

        "attach" | "a" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /attach <url>".to_string())
            } else {
                CommandResult::Attach {
                    url: args.to_string(),
                }
            }
        }

        "detach" => CommandResult::Detach,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?            Show this help message
  /new, /n                 Start a new chat
  /chats, /ls              List chats
  /open, /o <n>            Open chat n from the list
  /rename <title>          Rename the current chat
  /close [n]               Delete chat n, or the current chat
  /messages, /msgs         List messages with their indexes
  /edit, /e <i> <text>     Rewrite user message i and regenerate
  /retry, /r [i]           Regenerate reply i (default: last reply)
  /delete, /d <i>          Delete message i and everything after it
  /branch, /b [i]          Copy the chat up to message i into a new chat
  /model, /m [name]        List models or switch to a model
  /thinking, /t [lvl]      Show or set reasoning level (off/low/medium/high)
  /attach, /a <url>        Attach a file to the next message
  /detach                  Remove attachments from the next message
  /resync                  Save messages that failed to save
  /quit, /exit, /q         Exit prism

Press Ctrl-C while a reply is streaming to stop it."#
        .to_string()
}

/// Parse a message index argument
pub(crate) fn parse_index(arg: &str, len: usize) -> Result<usize, String> {
    if len == 0 {
        return Err("No messages yet.".to_string());
    }
    match arg.parse::<usize>() {
        Ok(index) if index < len => Ok(index),
        Ok(index) => Err(format!(
            "Invalid index {}. Valid range: 0-{}",
            index,
            len - 1
        )),
        Err(_) => Err(format!(
            "Invalid index '{}'. Use a number (0-{}).",
            arg,
            len - 1
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_ai::ChatId;

    fn ctx<'a>(messages: &'a [Message], chats: &'a [Chat]) -> CommandContext<'a> {
        CommandContext {
            messages,
            chats,
            model: "openai/gpt-4o",
            reasoning: ReasoningLevel::Off,
        }
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(execute_command("hello", &ctx(&[], &[])), None);
    }

    #[test]
    fn test_aliases_and_case() {
        let c = ctx(&[], &[]);
        assert_eq!(execute_command("/Q", &c), Some(CommandResult::Exit));
        assert_eq!(execute_command("  /new ", &c), Some(CommandResult::NewChat));
        assert_eq!(execute_command("/ls", &c), Some(CommandResult::ListChats));
        assert_eq!(
            execute_command("/frobnicate now", &c),
            Some(CommandResult::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_attach_needs_url() {
        let c = ctx(&[], &[]);
        assert!(matches!(
            execute_command("/attach", &c),
            Some(CommandResult::Message(_))
        ));
        assert_eq!(
            execute_command("/attach https://files.example/a.png", &c),
            Some(CommandResult::Attach {
                url: "https://files.example/a.png".to_string()
            })
        );
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("1", 3), Ok(1));
        assert!(parse_index("3", 3).is_err());
        assert!(parse_index("x", 3).is_err());
        assert!(parse_index("0", 0).is_err());
    }

    #[test]
    fn test_index_commands_see_messages() {
        let chat_id = ChatId::from("c1");
        let messages = vec![
            Message::user(chat_id.clone(), "hi", vec![]),
            Message::assistant(chat_id),
        ];
        let c = ctx(&messages, &[]);
        assert_eq!(execute_command("/d 1", &c), Some(CommandResult::Delete(1)));
        assert_eq!(execute_command("/b 0", &c), Some(CommandResult::Branch(0)));
    }
}
