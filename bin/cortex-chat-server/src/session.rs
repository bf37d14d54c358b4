//! Per-interaction chat session.
//!
//! A [`ChatSession`] owns the conversation id and the in-memory message list
//! for the duration of one handler. Starting a new chat creates a fresh
//! session; switching conversation replaces it wholesale with
//! [`ChatSession::load`]. Nothing is shared between handlers.

use cortex_chat_core::{
    CompletionClient, DEFAULT_SYSTEM_INSTRUCTION, Message, PromptBuilder, Role,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::MessageStore;

/// Prefix of the assistant message stored in place of a failed completion.
pub const COMPLETION_ERROR_PREFIX: &str = "❌ Erreur Cortex : ";

/// Generation settings picked by the user for one send.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_turns: i64,
}

/// Outcome of [`ChatSession::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// The assistant message appended to the conversation.
    pub message: Message,
    /// `true` when the completion failed and `message` carries the error text.
    pub failed: bool,
}

/// `true` if `content` is an inline completion error written by
/// [`ChatSession::send`].
pub fn is_completion_error(content: &str) -> bool {
    content.starts_with(COMPLETION_ERROR_PREFIX)
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    conversation_id: String,
    messages: Vec<Message>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Start a new conversation with a fresh id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Session for `conversation_id` with no history yet.
    pub fn with_id(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: vec![Message::system(DEFAULT_SYSTEM_INSTRUCTION)],
        }
    }

    /// Load `conversation_id` from `store`, re-prepending the system message.
    pub async fn load<S: MessageStore>(
        store: &S,
        conversation_id: impl Into<String>,
    ) -> Result<Self, sqlx::Error> {
        let mut session = Self::with_id(conversation_id);
        let history = store.read_ordered(&session.conversation_id).await?;
        session.messages.extend(history);
        Ok(session)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages shown in the transcript (system message hidden).
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Run one user turn: persist the user message, ask the model, persist
    /// the answer.
    ///
    /// A failed completion does not fail the turn: the error text is stored
    /// as the assistant message so the store and the in-memory view stay in
    /// step. Store failures are returned to the caller.
    #[instrument(skip(self, store, client, text), fields(conversation_id = %self.conversation_id, model = %params.model))]
    pub async fn send<S: MessageStore>(
        &mut self,
        store: &S,
        client: &CompletionClient,
        params: &GenerationParams,
        text: &str,
    ) -> Result<Reply, sqlx::Error> {
        self.messages.push(Message::user(text));
        store.append(&self.conversation_id, Role::User, text).await?;

        let prompt = PromptBuilder::new()
            .max_turns(params.max_turns)
            .render(&self.messages);

        let (content, failed) = match client
            .complete(&params.model, &prompt, params.temperature)
            .await
        {
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!(error = %e, "completion failed");
                (format!("{COMPLETION_ERROR_PREFIX}{e}"), true)
            }
        };

        let message = Message::assistant(content);
        self.messages.push(message.clone());
        store
            .append(&self.conversation_id, Role::Assistant, &message.content)
            .await?;

        info!(failed, "turn stored");
        Ok(Reply { message, failed })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
