//! /edit, /retry, /delete, /branch - commands addressing a message by index

use super::{CommandContext, CommandResult, parse_index};
use prism_ai::Message;

pub struct MessageCommand;

impl MessageCommand {
    /// `/edit <index> <text>`
    pub fn edit(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let Some((index, text)) = args.split_once(' ') else {
            return CommandResult::Message("Usage: /edit <index> <new text>".to_string());
        };
        match parse_index(index, ctx.messages.len()) {
            Ok(index) => CommandResult::Edit {
                index,
                text: text.trim().to_string(),
            },
            Err(msg) => CommandResult::Message(msg),
        }
    }

    /// `/retry [index]`, defaulting to the last reply
    pub fn retry(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return match ctx.messages.iter().rposition(Message::is_assistant) {
                Some(index) => CommandResult::Retry(index),
                None => CommandResult::Message("Nothing to retry.".to_string()),
            };
        }
        index_result(args, ctx, CommandResult::Retry)
    }

    pub fn delete(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /delete <index>".to_string());
        }
        index_result(args, ctx, CommandResult::Delete)
    }

    /// `/branch [index]`, defaulting to the last message
    pub fn branch(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return match ctx.messages.len() {
                0 => CommandResult::Message(
                    "No messages to branch from. Start a conversation first.".to_string(),
                ),
                len => CommandResult::Branch(len - 1),
            };
        }
        index_result(args, ctx, CommandResult::Branch)
    }
}

fn index_result(
    arg: &str,
    ctx: &CommandContext<'_>,
    make: impl FnOnce(usize) -> CommandResult,
) -> CommandResult {
    match parse_index(arg, ctx.messages.len()) {
        Ok(index) => make(index),
        Err(msg) => CommandResult::Message(msg),
    }
}
