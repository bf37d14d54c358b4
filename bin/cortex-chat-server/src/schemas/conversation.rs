use cortex_chat_core::{ConversationSummary, Message};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of `GET /api/conversations`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub conversation_id: String,
    /// First user message, or `"[Sans question]"`.
    pub title: String,
}

/// Response body for `POST /api/conversations`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateConversationResponse {
    pub conversation_id: String,
}

/// A stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Request body for `POST /api/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// User message text. Must not be blank.
    pub content: String,
    /// Cortex model id; defaults to the server's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature, normally in [0.0, 1.5]. Not range-checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response body for `POST /api/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    /// Always `"assistant"`.
    pub role: String,
    pub content: String,
    /// `true` when the completion failed and `content` is the error text.
    pub error: bool,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(c: ConversationSummary) -> Self {
        Self {
            conversation_id: c.conversation_id,
            title: c.title,
        }
    }
}

impl From<&Message> for MessageResponse {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.to_string(),
            content: m.content.clone(),
        }
    }
}
