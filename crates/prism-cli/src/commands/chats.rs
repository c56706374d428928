//! /open, /rename, /close - chat list navigation

use super::{CommandContext, CommandResult};

pub struct ChatsCommand;

impl ChatsCommand {
    pub fn open(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::ListChats;
        }
        match chat_index(args, ctx) {
            Ok(index) => CommandResult::OpenChat(index),
            Err(msg) => CommandResult::Message(msg),
        }
    }

    pub fn rename(args: &str) -> CommandResult {
        if args.is_empty() {
            CommandResult::Message("Usage: /rename <title>".to_string())
        } else {
            CommandResult::RenameChat(args.to_string())
        }
    }

    pub fn delete(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::DeleteChat(None);
        }
        match chat_index(args, ctx) {
            Ok(index) => CommandResult::DeleteChat(Some(index)),
            Err(msg) => CommandResult::Message(msg),
        }
    }
}

fn chat_index(arg: &str, ctx: &CommandContext<'_>) -> Result<usize, String> {
    let count = ctx.chats.len();
    if count == 0 {
        return Err("No chats yet.".to_string());
    }
    match arg.parse::<usize>() {
        Ok(index) if index < count => Ok(index),
        _ => Err(format!(
            "Invalid chat '{}'. Use a number from /chats (0-{}).",
            arg,
            count - 1
        )),
    }
}
