//! prism - line-mode chat client

mod commands;
mod config;
mod render;
mod store;
mod utils;

use anyhow::Context;
use clap::Parser;
use commands::{CommandContext, CommandResult};
use prism_ai::{ChatApi, ChatId, GenerationConfig, MessageId, ReasoningLevel, models};
use prism_chat::{ChatConfig, ChatHandle, ChatSession, Draft, Error, MessageStore, MirroredStore};
use render::RenderTask;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// prism - chat with language models from the terminal
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (id or part of its name)
    #[arg(short, long)]
    model: Option<String>,

    /// Reasoning level (off, low, medium, high)
    #[arg(long)]
    reasoning_level: Option<String>,

    /// Chat backend URL
    #[arg(long)]
    server_url: Option<String>,

    /// Send a single message and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Continue the most recent chat
    #[arg(long = "continue")]
    continue_last: bool,

    /// Open a chat by ID
    #[arg(long)]
    chat: Option<String>,

    /// List saved chats
    #[arg(long)]
    chats: bool,

    /// Also truncate the backend's copy of a chat when messages are removed
    #[arg(long)]
    mirror_deletes: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("prism=debug,prism_ai=debug,prism_chat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve a model argument against the catalog, keeping unknown ids as-is
fn resolve_model(query: String) -> String {
    match models::find_model(&query) {
        Some(model) => model.id.to_string(),
        None => {
            tracing::warn!("Model {} is not in the catalog; sending it as-is", query);
            query
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.init_config {
        let path = config::Config::init()?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = config::Config::load();

    let data_dir = cfg.data_dir();
    let local = Arc::new(
        store::JsonlStore::open(&data_dir)
            .with_context(|| format!("Failed to open chat store at {}", data_dir.display()))?,
    );

    if args.chats {
        return list_chats(&*local, &cfg.owner_id).await;
    }

    let server_url = args.server_url.unwrap_or_else(|| cfg.server_url.clone());
    let mut api = ChatApi::new(server_url);
    match cfg.api_token() {
        Some(token) => api = api.with_token(token),
        None => tracing::debug!("No API token configured"),
    }

    let store: Arc<dyn MessageStore> = if args.mirror_deletes || cfg.mirror_deletes {
        Arc::new(MirroredStore::new(local, api.clone()))
    } else {
        local
    };

    let model = args
        .model
        .or(cfg.model.clone())
        .map(resolve_model)
        .unwrap_or_else(|| models::default_model().id.to_string());

    let reasoning = match args.reasoning_level.as_deref() {
        Some(name) => ReasoningLevel::parse(name)
            .with_context(|| format!("Unknown reasoning level: {}", name))?,
        None => cfg.reasoning().unwrap_or_default(),
    };

    let config = ChatConfig {
        generation: GenerationConfig { model, reasoning },
        owner_id: cfg.owner_id.clone(),
        regenerate_after_delete: cfg.regenerate_after_delete,
    };
    let api = Arc::new(api);
    let mut session = ChatSession::new(config, store, api.clone(), api);
    let renderer = RenderTask::spawn(session.subscribe());

    // Errors surface as notices through the renderer
    let chats = session.load_chats().await.unwrap_or_default();
    if let Some(id) = args.chat {
        session.open_chat(&ChatId::from(id)).await?;
    } else if args.continue_last {
        match chats.first() {
            Some(chat) => session.open_chat(&chat.id).await?,
            None => eprintln!("No saved chats to continue."),
        }
    }
    renderer.flush().await;

    spawn_interrupt_handler(session.handle());

    let result = match args.command {
        Some(prompt) => session
            .submit(&prompt, vec![])
            .await
            .map_err(anyhow::Error::from),
        None => run_interactive(&mut session, &renderer).await,
    };

    session.settle().await;
    renderer.flush().await;
    renderer.abort();
    result
}

/// Ctrl-C stops a streaming reply; when idle it exits.
fn spawn_interrupt_handler(handle: ChatHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                handle.cancel();
            } else {
                eprintln!();
                std::process::exit(130);
            }
        }
    });
}

async fn list_chats(store: &dyn MessageStore, owner_id: &str) -> anyhow::Result<()> {
    let chats = store.list_chats(owner_id).await?;
    if chats.is_empty() {
        println!("No saved chats found.");
        return Ok(());
    }
    println!("Saved chats:\n");
    println!("{:<38} {:<17} Title", "ID", "Created");
    println!("{}", "-".repeat(80));
    for chat in &chats {
        println!(
            "{:<38} {:<17} {}",
            chat.id,
            chat.created_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            chat.display_title()
        );
    }
    println!("\nOpen with: prism --chat <id>");
    Ok(())
}

/// Drop the error; the session has already reported it
fn reported<T>(result: prism_chat::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Operation failed: {}", e);
            None
        }
    }
}

async fn run_interactive(session: &mut ChatSession, renderer: &RenderTask) -> anyhow::Result<()> {
    let mut draft = Draft::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if std::io::stderr().is_terminal() {
        let model = &session.config().generation.model;
        eprintln!("prism ({}), /help for commands", models::display_name(model));
        eprintln!();
    }

    loop {
        if draft.attachments().is_empty() {
            print!("> ");
        } else {
            print!("> [{} attached] ", draft.attachments().len());
        }
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.starts_with('/') {
            let result = {
                let app_state = session.app_state();
                let state = app_state.read();
                let ctx = CommandContext {
                    messages: session.messages(),
                    chats: state.chats(),
                    model: &session.config().generation.model,
                    reasoning: session.config().generation.reasoning,
                };
                commands::execute_command(input, &ctx)
            };
            if let Some(result) = result {
                let exit = handle_command(session, &mut draft, result).await;
                renderer.flush().await;
                if exit {
                    break;
                }
                println!();
            }
            continue;
        }

        if input.is_empty() && draft.is_empty() {
            continue;
        }
        if !input.is_empty() {
            draft.set_text(input);
        }
        let (text, attachments) = match draft.take() {
            Ok(taken) => taken,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        println!();
        let result = session.submit(&text, attachments.clone()).await;
        renderer.flush().await;
        if let Err(e) = result {
            if !matches!(e, Error::Persistence(_)) {
                draft.restore(text, attachments);
                eprintln!("(message kept; press Enter to send it again)");
            }
        }
        println!();
    }

    Ok(())
}

fn message_id_at(session: &ChatSession, index: usize) -> Option<MessageId> {
    session.messages().get(index).map(|m| m.id.clone())
}

fn chat_id_at(session: &ChatSession, index: usize) -> Option<ChatId> {
    session
        .app_state()
        .read()
        .chats()
        .get(index)
        .map(|c| c.id.clone())
}

/// Carry out a parsed command. Returns true when the user asked to exit.
async fn handle_command(session: &mut ChatSession, draft: &mut Draft, result: CommandResult) -> bool {
    match result {
        CommandResult::Message(msg) => println!("{}", msg),
        CommandResult::Exit => return true,
        CommandResult::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
        CommandResult::NewChat => {
            session.new_chat();
            println!("Started a new chat.");
        }
        CommandResult::ListChats => {
            if let Some(chats) = reported(session.load_chats().await) {
                if chats.is_empty() {
                    println!("No chats yet.");
                }
                let current = session.chat_id().cloned();
                for (i, chat) in chats.iter().enumerate() {
                    let is_current = current.as_ref() == Some(&chat.id);
                    println!("{}", utils::chat_line(i, chat, is_current));
                }
            }
        }
        CommandResult::OpenChat(index) => {
            if let Some(id) = chat_id_at(session, index) {
                reported(session.open_chat(&id).await);
            }
        }
        CommandResult::RenameChat(title) => match session.chat_id().cloned() {
            Some(id) => {
                reported(session.rename_chat(&id, &title).await);
            }
            None => println!("Send a message first; the chat is created with it."),
        },
        CommandResult::DeleteChat(index) => {
            let id = match index {
                Some(index) => chat_id_at(session, index),
                None => session.chat_id().cloned(),
            };
            match id {
                Some(id) => {
                    if reported(session.delete_chat(&id).await).is_some() {
                        println!("Deleted chat.");
                    }
                }
                None => println!("No chat to delete."),
            }
        }
        CommandResult::ListMessages => {
            let conversation = session.conversation();
            if conversation.messages.is_empty() {
                println!("No messages yet.");
            }
            for (i, message) in conversation.messages.iter().enumerate() {
                let unsynced = !conversation.is_synced(&message.id);
                println!("{}", utils::message_line(i, message, unsynced));
            }
        }
        CommandResult::Edit { index, text } => {
            if let Some(id) = message_id_at(session, index) {
                println!();
                reported(session.edit(&id, &text).await);
            }
        }
        CommandResult::Retry(index) => {
            if let Some(id) = message_id_at(session, index) {
                println!();
                reported(session.retry(&id).await);
            }
        }
        CommandResult::Delete(index) => {
            if let Some(id) = message_id_at(session, index) {
                reported(session.delete(&id).await);
            }
        }
        CommandResult::Branch(index) => {
            if let Some(id) = message_id_at(session, index) {
                reported(session.branch(&id).await);
            }
        }
        CommandResult::ChangeModel(model) => {
            session.set_model(model.id);
            println!("Switched to: {} ({})", model.name, model.id);
            if !model.reasoning && session.config().generation.reasoning != ReasoningLevel::Off {
                println!("This model does not take a reasoning level; it will not be sent.");
            }
        }
        CommandResult::ChangeReasoning(level) => {
            session.set_reasoning(level);
            println!("Reasoning level set to: {}", level.name());
        }
        CommandResult::Resync => match reported(session.resync().await) {
            Some(0) => println!("Everything is saved."),
            Some(n) => println!("Saved {} messages.", n),
            None => {}
        },
        CommandResult::Attach { url } => {
            let attachment = utils::attachment_from_url(&url);
            println!("Attached {} ({})", attachment.name, attachment.mime_type);
            draft.attach(attachment);
        }
        CommandResult::Detach => {
            let ids: Vec<_> = draft.attachments().iter().map(|a| a.id.clone()).collect();
            for id in &ids {
                draft.remove(id);
            }
            println!("Removed {} attachments.", ids.len());
        }
    }
    false
}
