//! Shared utilities

use prism_ai::{Attachment, Chat, Message};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// One line per message: index, role and a short preview
pub fn message_line(index: usize, message: &Message, unsynced: bool) -> String {
    let role = if message.is_user() { "user" } else { "assistant" };
    let mut preview = truncate_chars(&message.text().replace('\n', " "), 60);
    if !message.attachments.is_empty() {
        preview.push_str(&format!(" (+{} attachments)", message.attachments.len()));
    }
    let flag = if unsynced { " [not saved]" } else { "" };
    format!("  {}: [{}] {}{}", index, role, preview, flag)
}

/// One line per chat: index, title and creation time
pub fn chat_line(index: usize, chat: &Chat, current: bool) -> String {
    let created = chat
        .created_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string();
    let marker = if current { " *" } else { "" };
    format!(
        "  {:<3} {:<17} {}{}",
        index,
        created,
        truncate_chars(chat.display_title(), 50),
        marker
    )
}

/// Build an attachment for a file that is already hosted at `url`
pub fn attachment_from_url(url: &str) -> Attachment {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("attachment")
        .to_string();
    let mime = mime_for(&name);
    Attachment::committed(name, url, 0, mime)
}

fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
