//! Session manager & persistence bridge: creates or resumes a session,
//! keeps the in-memory message log, and flushes it to the scoped stores
//! via snapshots.

use sheetmind_core::{SessionId, UserId};
use sheetmind_db::Database;
use sheetmind_llm::types::{Message as LlmMessage, MessageContent, MessageRole};
use sheetmind_llm::LlmProvider;
use sheetmind_stores::{
    CheckpointStore, CheckpointType, GlobalRuleStore, MessageStore, Role as StoredRole, Session,
    SessionStore, StoreError, TitleSource, WorkspaceFileRecord, WorkspaceFileStore,
};
use serde_json::Value;

use crate::error::EngineResult;
use crate::masking;
use crate::rules;
use crate::workspace_manifest::{self, SheetInspector};

/// Lower bound of an auto-synthesized session title, per the
/// truncated-first-message fallback.
pub const AUTO_TITLE_MIN_CHARS: usize = 5;
/// Upper bound of an auto-synthesized session title.
pub const AUTO_TITLE_MAX_CHARS: usize = 10;

/// Bridges an in-memory turn loop to its persisted session row,
/// messages, and checkpoints.
///
/// Exposes exactly the fields the persistence snapshot needs —
/// `raw_messages`, `message_snapshot_index`, `session_turn` — plus the
/// store-backed operations that flush them.
pub struct SessionBridge<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
    session: Session,
    /// Every message appended this process lifetime, oldest first.
    pub raw_messages: Vec<LlmMessage>,
    /// Index into `raw_messages` of the first message not yet flushed.
    pub message_snapshot_index: usize,
    /// The turn currently in progress (or just completed).
    pub session_turn: i64,
}

impl<'a> SessionBridge<'a> {
    /// Start a session: create a new row, or resume one and load its
    /// messages back into memory. Loading the latest checkpoint is the
    /// caller's responsibility (via [`Self::latest_checkpoint`]) since
    /// what it restores (task lists, window state) lives outside the
    /// message log.
    ///
    /// # Errors
    ///
    /// Returns an error if any store operation fails.
    pub async fn start(db: &'a Database, user_id: Option<UserId>, resume: Option<&SessionId>) -> EngineResult<Self> {
        let store = SessionStore::new(db, user_id.clone());
        let session = match resume {
            Some(id) => store.get(id).await?,
            None => store.create().await?,
        };

        let mut raw_messages = Vec::new();
        let mut session_turn = 0i64;
        if resume.is_some() {
            let stored = MessageStore::new(db).list(&session.id).await?;
            session_turn = stored.iter().map(|m| m.turn_number).max().unwrap_or(0);
            for msg in &stored {
                raw_messages.push(stored_to_llm(msg)?);
            }
        }

        Ok(Self {
            db,
            user_id,
            session,
            message_snapshot_index: raw_messages.len(),
            raw_messages,
            session_turn,
        })
    }

    /// The session being managed.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The database this bridge is scoped to, for callers (the engine
    /// loop) that need to write their own audit rows.
    #[must_use]
    pub fn db(&self) -> &Database {
        self.db
    }

    /// The user this bridge is scoped to.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Append a message to the in-memory log. Not yet persisted — call
    /// [`Self::flush`] to write it.
    pub fn push(&mut self, message: LlmMessage) {
        self.raw_messages.push(message);
    }

    /// The most recent checkpoint for this session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_checkpoint(&self) -> EngineResult<Option<sheetmind_stores::Checkpoint>> {
        Ok(CheckpointStore::new(self.db).latest(&self.session.id).await?)
    }

    /// Build the system prompt's non-instruction sections: compiled
    /// global + session rules, then the workspace manifest summary.
    ///
    /// # Errors
    ///
    /// Returns an error if composing rules or listing workspace files fails.
    pub async fn build_system_prompt(&self, global_rules: &GlobalRuleStore, workspace_root: &str) -> EngineResult<String> {
        let mut sections = Vec::new();
        let rules_block = rules::compose_rules_block(global_rules, self.db, &self.session.id).await?;
        if !rules_block.is_empty() {
            sections.push(rules_block);
        }
        let files = WorkspaceFileStore::new(self.db, self.user_id.clone()).list_for_workspace(workspace_root).await?;
        let manifest_summary = workspace_manifest::render_summary(&files);
        if !manifest_summary.is_empty() {
            sections.push(manifest_summary);
        }
        Ok(sections.join("\n\n"))
    }

    /// Refresh (or take the initial) workspace manifest for `workspace_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or its persistence fails.
    pub async fn refresh_workspace(&self, workspace_root: &str, inspector: &dyn SheetInspector) -> EngineResult<Vec<WorkspaceFileRecord>> {
        workspace_manifest::refresh_workspace(self.db, self.user_id.clone(), workspace_root, inspector).await
    }

    /// Observation-masked view of the in-memory log, suitable for
    /// handing to the LLM caller. Does not affect `raw_messages`.
    #[must_use]
    pub fn masked_messages(&self) -> Vec<LlmMessage> {
        masking::mask_messages(&self.raw_messages)
    }

    /// Persist every message appended since the last flush, advance the
    /// snapshot index, and keep `sessions.message_count` in sync.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub async fn flush(&mut self) -> EngineResult<()> {
        if self.message_snapshot_index >= self.raw_messages.len() {
            return Ok(());
        }
        let messages = MessageStore::new(self.db);
        let sessions = SessionStore::new(self.db, self.user_id.clone());
        let pending: Vec<LlmMessage> = self.raw_messages[self.message_snapshot_index..].to_vec();
        for message in &pending {
            let role = to_stored_role(message.role);
            let tool_call_id = match &message.content {
                MessageContent::ToolResult(result) => Some(result.call_id.clone()),
                _ => None,
            };
            let content = serde_json::to_value(&message.content).map_err(StoreError::Serde)?;
            messages.append(&self.session.id, role, &content, tool_call_id.as_deref(), self.session_turn).await?;
            sessions.bump_message_count(&self.session.id).await?;
        }
        self.message_snapshot_index = self.raw_messages.len();
        Ok(())
    }

    /// Checkpoint the session's current turn state.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn checkpoint(&self, state_json: &Value, task_list_json: &Value) -> EngineResult<()> {
        CheckpointStore::new(self.db)
            .write(&self.session.id, CheckpointType::Turn, state_json, task_list_json, self.session_turn)
            .await?;
        Ok(())
    }

    /// After the first assistant reply, synthesize a short title via
    /// `title_llm` and persist it, but only while `title_source` is
    /// still unset (never overwrites a user-chosen title). On an LLM
    /// failure, falls back to a truncated prefix of the first user
    /// message rather than leaving the title unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails (title-synthesis
    /// failures themselves are swallowed into the fallback).
    pub async fn sync_title(&mut self, title_llm: &dyn LlmProvider) -> EngineResult<()> {
        if self.session.title_source != TitleSource::Unset {
            return Ok(());
        }
        let Some(first_user_text) = self.raw_messages.iter().find_map(|m| {
            if m.role == MessageRole::User { m.text().map(str::to_string) } else { None }
        }) else {
            return Ok(());
        };

        let prompt = format!(
            "Produce a {AUTO_TITLE_MIN_CHARS}-{AUTO_TITLE_MAX_CHARS} character title summarizing this \
             request. Reply with only the title, no punctuation or quotes.\n\n{first_user_text}"
        );
        let title = match title_llm.complete_simple(&prompt).await {
            Ok(text) => clamp_title(&text),
            Err(_) => clamp_title(&first_user_text),
        };

        SessionStore::new(self.db, self.user_id.clone()).set_title(&self.session.id, &title, TitleSource::Auto).await?;
        self.session.title = title;
        self.session.title_source = TitleSource::Auto;
        Ok(())
    }
}

fn clamp_title(text: &str) -> String {
    let trimmed = text.trim();
    let clamped: String = trimmed.chars().take(AUTO_TITLE_MAX_CHARS).collect();
    if clamped.is_empty() {
        "Untitled".to_string()
    } else {
        clamped
    }
}

fn to_stored_role(role: MessageRole) -> StoredRole {
    match role {
        MessageRole::System => StoredRole::System,
        MessageRole::User => StoredRole::User,
        MessageRole::Assistant => StoredRole::Assistant,
        MessageRole::Tool => StoredRole::Tool,
    }
}

fn to_llm_role(role: StoredRole) -> MessageRole {
    match role {
        StoredRole::System => MessageRole::System,
        StoredRole::User => MessageRole::User,
        StoredRole::Assistant => MessageRole::Assistant,
        StoredRole::Tool => MessageRole::Tool,
    }
}

fn stored_to_llm(stored: &sheetmind_stores::Message) -> EngineResult<LlmMessage> {
    let content: MessageContent = serde_json::from_value(stored.content.clone()).map_err(StoreError::Serde)?;
    Ok(LlmMessage { role: to_llm_role(stored.role), content })
}

#[cfg(test)]
mod tests {
    use sheetmind_db::migrate;

    use super::*;

    #[tokio::test]
    async fn start_creates_a_fresh_session() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let bridge = SessionBridge::start(&db, None, None).await.unwrap();
        assert!(bridge.raw_messages.is_empty());
        assert_eq!(bridge.session().title_source, TitleSource::Unset);
    }

    #[tokio::test]
    async fn flush_persists_and_resume_reloads() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let mut bridge = SessionBridge::start(&db, None, None).await.unwrap();
        bridge.push(LlmMessage::user("hello"));
        bridge.push(LlmMessage::assistant("hi there"));
        bridge.flush().await.unwrap();

        let session_id = bridge.session().id.clone();
        let resumed = SessionBridge::start(&db, None, Some(&session_id)).await.unwrap();
        assert_eq!(resumed.raw_messages.len(), 2);
        assert_eq!(resumed.raw_messages[0].text(), Some("hello"));
    }

    #[tokio::test]
    async fn flush_is_idempotent_on_nothing_new() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let mut bridge = SessionBridge::start(&db, None, None).await.unwrap();
        bridge.push(LlmMessage::user("hello"));
        bridge.flush().await.unwrap();
        bridge.flush().await.unwrap();
        let count = MessageStore::new(&db).list(&bridge.session().id).await.unwrap().len();
        assert_eq!(count, 1);
    }
}
