//! Message store — append-only, ordered by auto-increment id within a session.

use sheetmind_core::{SessionId, Timestamp};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
    /// A tool call result.
    Tool,
    /// System/developer instructions.
    System,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::System => "system",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

/// A single turn-ordered message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Auto-increment, monotonic within the whole table.
    pub id: i64,
    /// Owning session.
    pub session_id: SessionId,
    /// Author role.
    pub role: Role,
    /// Original message content, JSON-serialised.
    pub content: serde_json::Value,
    /// Links an assistant tool call to its tool-result message.
    pub tool_call_id: Option<String>,
    /// Which agent turn produced this message.
    pub turn_number: i64,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Append-only access to the `messages` table.
pub struct MessageStore<'a> {
    db: &'a Database,
}

impl<'a> MessageStore<'a> {
    /// Build a message store over `db`. Messages have no user scope of
    /// their own — they inherit their session's ownership.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append a message to a session, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &serde_json::Value,
        tool_call_id: Option<&str>,
        turn_number: i64,
    ) -> StoreResult<i64> {
        self.db
            .execute(
                "INSERT INTO messages (session_id, role, content, tool_call_id, turn_number, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(session_id.as_str()),
                    Param::text(role.as_str()),
                    Param::text(content.to_string()),
                    tool_call_id.map(Param::text).unwrap_or(Param::Null),
                    Param::Int(turn_number),
                    Param::text(Timestamp::now().to_rfc3339()),
                ],
            )
            .await?;
        let row = self
            .db
            .query_one("SELECT id FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT 1", &[Param::text(
                session_id.as_str(),
            )])
            .await?;
        Ok(row.get_named("id")?)
    }

    /// List every message for a session, ordered by id ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or JSON decode fails.
    pub async fn list(&self, session_id: &SessionId) -> StoreResult<Vec<Message>> {
        let rows = self
            .db
            .query(
                "SELECT id, session_id, role, content, tool_call_id, turn_number, created_at \
                 FROM messages WHERE session_id = ? ORDER BY id ASC",
                &[Param::text(session_id.as_str())],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Message {
                    id: row.get_named("id")?,
                    session_id: SessionId::from_existing(row.get_named::<String>("session_id")?),
                    role: Role::parse(&row.get_named::<String>("role")?),
                    content: serde_json::from_str(&row.get_named::<String>("content")?)?,
                    tool_call_id: row.get_named("tool_call_id")?,
                    turn_number: row.get_named("turn_number")?,
                    created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                        .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Delete every message belonging to a session (session clear/rollback).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear(&self, session_id: &SessionId) -> StoreResult<()> {
        self.db
            .execute("DELETE FROM messages WHERE session_id = ?", &[Param::text(session_id.as_str())])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;
    use serde_json::json;

    #[tokio::test]
    async fn append_and_list_preserves_order() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let session_id = SessionId::new();
        let store = MessageStore::new(&db);
        store.append(&session_id, Role::User, &json!({"text": "hi"}), None, 1).await.unwrap();
        store.append(&session_id, Role::Assistant, &json!({"text": "hello"}), None, 1).await.unwrap();
        let messages = store.list(&session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[0].id < messages[1].id);
    }

    #[tokio::test]
    async fn clear_removes_all_session_messages() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let session_id = SessionId::new();
        let store = MessageStore::new(&db);
        store.append(&session_id, Role::User, &json!({"text": "hi"}), None, 1).await.unwrap();
        store.clear(&session_id).await.unwrap();
        assert!(store.list(&session_id).await.unwrap().is_empty());
    }
}
