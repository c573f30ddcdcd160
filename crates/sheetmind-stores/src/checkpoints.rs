//! Per-session checkpoints — full-state snapshots written each turn,
//! keeping only the newest N per session.

use sheetmind_core::{SessionId, Timestamp};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;

/// What triggered a checkpoint write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointType {
    /// Written automatically at the end of a turn.
    Turn,
    /// Written explicitly (e.g. before a risky tool call).
    Manual,
}

impl CheckpointType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Turn => "turn",
            Self::Manual => "manual",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "manual" => Self::Manual,
            _ => Self::Turn,
        }
    }
}

/// A single checkpoint row.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Owning session.
    pub session_id: SessionId,
    /// What triggered this write.
    pub checkpoint_type: CheckpointType,
    /// Serialised engine/session state.
    pub state_json: serde_json::Value,
    /// Serialised task list at the time of the checkpoint.
    pub task_list_json: serde_json::Value,
    /// Turn number this checkpoint was taken at.
    pub turn_number: i64,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// The maximum number of checkpoints retained per session.
pub const MAX_CHECKPOINTS_PER_SESSION: i64 = 20;

/// CRUD access to `session_checkpoints`.
pub struct CheckpointStore<'a> {
    db: &'a Database,
}

impl<'a> CheckpointStore<'a> {
    /// Build a store over `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Write a new checkpoint, then evict anything beyond the newest
    /// [`MAX_CHECKPOINTS_PER_SESSION`] for this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or eviction fails.
    pub async fn write(
        &self,
        session_id: &SessionId,
        checkpoint_type: CheckpointType,
        state_json: &serde_json::Value,
        task_list_json: &serde_json::Value,
        turn_number: i64,
    ) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO session_checkpoints (session_id, checkpoint_type, state_json, task_list_json, turn_number, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(session_id.as_str()),
                    Param::text(checkpoint_type.as_str()),
                    Param::text(state_json.to_string()),
                    Param::text(task_list_json.to_string()),
                    Param::Int(turn_number),
                    Param::text(Timestamp::now().to_rfc3339()),
                ],
            )
            .await?;
        self.evict_excess(session_id).await
    }

    async fn evict_excess(&self, session_id: &SessionId) -> StoreResult<()> {
        let keep = self
            .db
            .query(
                "SELECT id FROM session_checkpoints WHERE session_id = ? ORDER BY id DESC LIMIT ?",
                &[Param::text(session_id.as_str()), Param::Int(MAX_CHECKPOINTS_PER_SESSION)],
            )
            .await?;
        let Some(oldest_kept) = keep.last() else { return Ok(()) };
        let oldest_kept_id: i64 = oldest_kept.get_named("id")?;
        self.db
            .execute(
                "DELETE FROM session_checkpoints WHERE session_id = ? AND id < ?",
                &[Param::text(session_id.as_str()), Param::Int(oldest_kept_id)],
            )
            .await?;
        Ok(())
    }

    /// Fetch the most recent checkpoint for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest(&self, session_id: &SessionId) -> StoreResult<Option<Checkpoint>> {
        let row = self
            .db
            .query_optional(
                "SELECT session_id, checkpoint_type, state_json, task_list_json, turn_number, created_at \
                 FROM session_checkpoints WHERE session_id = ? ORDER BY id DESC LIMIT 1",
                &[Param::text(session_id.as_str())],
            )
            .await?;
        row.map(|row| {
            Ok(Checkpoint {
                session_id: SessionId::from_existing(row.get_named::<String>("session_id")?),
                checkpoint_type: CheckpointType::parse(&row.get_named::<String>("checkpoint_type")?),
                state_json: serde_json::from_str(&row.get_named::<String>("state_json")?)?,
                task_list_json: serde_json::from_str(&row.get_named::<String>("task_list_json")?)?,
                turn_number: row.get_named("turn_number")?,
                created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                    .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;
    use serde_json::json;

    #[tokio::test]
    async fn write_keeps_only_newest_n() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = CheckpointStore::new(&db);
        let session_id = SessionId::new();
        for turn in 0..(MAX_CHECKPOINTS_PER_SESSION + 5) {
            store
                .write(&session_id, CheckpointType::Turn, &json!({"turn": turn}), &json!([]), turn)
                .await
                .unwrap();
        }
        let count: i64 = db
            .query_one("SELECT COUNT(*) as n FROM session_checkpoints WHERE session_id = ?", &[Param::text(
                session_id.as_str(),
            )])
            .await
            .unwrap()
            .get_named("n")
            .unwrap();
        assert_eq!(count, MAX_CHECKPOINTS_PER_SESSION);
        let latest = store.latest(&session_id).await.unwrap().unwrap();
        assert_eq!(latest.turn_number, MAX_CHECKPOINTS_PER_SESSION + 4);
    }
}
