//! Append-only audit logs: `tool_call_log` and `llm_call_log`.

use sheetmind_core::{SessionId, Timestamp, UserId};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;
use crate::scope::UserFilter;

/// One row of the tool-call audit log.
#[derive(Debug, Clone)]
pub struct ToolCallLogEntry {
    /// Owning session.
    pub session_id: SessionId,
    /// Agent turn number.
    pub turn: i64,
    /// Iteration within the turn (tool calls can loop within a turn).
    pub iteration: i64,
    /// Name of the tool invoked.
    pub tool_name: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Wall-clock latency, if measured.
    pub latency_ms: Option<i64>,
}

/// One row of the LLM-call audit log.
#[derive(Debug, Clone)]
pub struct LlmCallLogEntry {
    /// Owning session.
    pub session_id: SessionId,
    /// Agent turn number.
    pub turn: i64,
    /// Iteration within the turn.
    pub iteration: i64,
    /// Model name used for the call.
    pub model_name: String,
    /// Prompt token count, if reported.
    pub prompt_tokens: Option<i64>,
    /// Completion token count, if reported.
    pub completion_tokens: Option<i64>,
    /// Total call latency.
    pub latency_ms: Option<i64>,
    /// Time to first streamed token, if streaming.
    pub ttft_ms: Option<i64>,
    /// Whether the call succeeded.
    pub success: bool,
}

/// Append-only writer/reader for both call-log tables.
pub struct AuditLogStore<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
}

impl<'a> AuditLogStore<'a> {
    /// Build a store scoped to `user_id`.
    #[must_use]
    pub fn new(db: &'a Database, user_id: Option<UserId>) -> Self {
        Self { db, user_id }
    }

    /// Append a tool-call log row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn log_tool_call(&self, entry: &ToolCallLogEntry) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO tool_call_log (session_id, turn, iteration, tool_name, success, latency_ms, created_at, user_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(entry.session_id.as_str()),
                    Param::Int(entry.turn),
                    Param::Int(entry.iteration),
                    Param::text(&entry.tool_name),
                    Param::Bool(entry.success),
                    entry.latency_ms.map(Param::Int).unwrap_or(Param::Null),
                    Param::text(Timestamp::now().to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Append an LLM-call log row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn log_llm_call(&self, entry: &LlmCallLogEntry) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO llm_call_log (session_id, turn, iteration, model_name, prompt_tokens, completion_tokens, \
                 latency_ms, ttft_ms, success, created_at, user_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(entry.session_id.as_str()),
                    Param::Int(entry.turn),
                    Param::Int(entry.iteration),
                    Param::text(&entry.model_name),
                    entry.prompt_tokens.map(Param::Int).unwrap_or(Param::Null),
                    entry.completion_tokens.map(Param::Int).unwrap_or(Param::Null),
                    entry.latency_ms.map(Param::Int).unwrap_or(Param::Null),
                    entry.ttft_ms.map(Param::Int).unwrap_or(Param::Null),
                    Param::Bool(entry.success),
                    Param::text(Timestamp::now().to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Count tool calls logged for a session, ordered by `created_at`
    /// then `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_tool_calls(&self, session_id: &SessionId) -> StoreResult<i64> {
        let row = self
            .db
            .query_one(
                "SELECT COUNT(*) as n FROM tool_call_log WHERE session_id = ?",
                &[Param::text(session_id.as_str())],
            )
            .await?;
        Ok(row.get_named("n")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;

    #[tokio::test]
    async fn logs_append_and_count() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let session_id = SessionId::new();
        let store = AuditLogStore::new(&db, None);
        store
            .log_tool_call(&ToolCallLogEntry {
                session_id: session_id.clone(),
                turn: 1,
                iteration: 0,
                tool_name: "memory_save".into(),
                success: true,
                latency_ms: Some(12),
            })
            .await
            .unwrap();
        assert_eq!(store.count_tool_calls(&session_id).await.unwrap(), 1);
    }
}
