//! Form / query payloads and template view models for the HTML pages.

use cortex_chat_core::{ConversationSummary, Message};
use serde::{Deserialize, Serialize};

use crate::session::is_completion_error;

/// Characters of a conversation title shown in the selector.
const TITLE_MAX_CHARS: usize = 40;

/// Generation settings carried between pages as query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Query of `GET /chat/open`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenConversationQuery {
    pub conversation_id: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Form posted by the message box.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageForm {
    pub content: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Conversation selector entry.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationOption {
    pub conversation_id: String,
    pub label: String,
}

/// Transcript entry.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub role: String,
    pub content: String,
    pub error: bool,
}

/// Shorten `title` to the selector width, marking the cut with `…`.
pub fn truncate_title(title: &str) -> String {
    let title = title.trim();
    match title.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &title[..cut]),
        None => title.to_owned(),
    }
}

impl From<&ConversationSummary> for ConversationOption {
    fn from(c: &ConversationSummary) -> Self {
        Self {
            conversation_id: c.conversation_id.clone(),
            label: truncate_title(&c.title),
        }
    }
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.to_string(),
            content: m.content.clone(),
            error: is_completion_error(&m.content),
        }
    }
}
