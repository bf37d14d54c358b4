use std::future::Future;

use chrono::{SecondsFormat, Utc};
use cortex_chat_core::{ConversationSummary, Message, Role, UNTITLED_CONVERSATION};
use tracing::warn;

use crate::entities::SqliteStore;

/// Append-only log of chat messages grouped by conversation.
pub trait MessageStore: Send + Sync + 'static {
    /// Persist one message. The store assigns the timestamp.
    fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// User and assistant messages of a conversation in creation order.
    fn read_ordered(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, sqlx::Error>> + Send;

    /// All conversations, most recently started first.
    ///
    /// The title is the first user message of the conversation (trimmed), or
    /// [`UNTITLED_CONVERSATION`] when it has none.
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, sqlx::Error>> + Send;
}

impl MessageStore for SqliteStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        // Fixed-width UTC timestamps so lexical order is chronological order.
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        sqlx::query(
            "INSERT INTO conversations (conversation_id, timestamp, role, content) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(conversation_id)
        .bind(&timestamp)
        .bind(role.to_string())
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_ordered(&self, conversation_id: &str) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT role, content FROM conversations \
             WHERE conversation_id = ?1 ORDER BY timestamp, id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(role, content)| match role.trim().parse::<Role>() {
                Ok(role) if role.is_turn() => Some(Message::new(role, content)),
                Ok(_) => None,
                Err(_) => {
                    warn!(%conversation_id, raw_role = %role, "skipping row with unknown role");
                    None
                }
            })
            .collect())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "WITH first_user AS ( \
                 SELECT conversation_id, content AS first_question, \
                        ROW_NUMBER() OVER (PARTITION BY conversation_id ORDER BY timestamp, id) AS rn \
                 FROM conversations \
                 WHERE LOWER(role) = 'user' \
             ), \
             started AS ( \
                 SELECT conversation_id, MIN(timestamp) AS started_at, MIN(id) AS first_id \
                 FROM conversations \
                 GROUP BY conversation_id \
             ) \
             SELECT s.conversation_id, COALESCE(f.first_question, ?1) AS title \
             FROM started s \
             LEFT JOIN first_user f \
                 ON s.conversation_id = f.conversation_id AND f.rn = 1 \
             ORDER BY s.started_at DESC, s.first_id DESC",
        )
        .bind(UNTITLED_CONVERSATION)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(conversation_id, title)| ConversationSummary {
                conversation_id,
                title: title.trim().to_owned(),
            })
            .collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
