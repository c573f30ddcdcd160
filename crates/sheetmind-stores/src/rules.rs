//! Rules — persistent guidance injected into the system prompt.
//!
//! Global rules live in a YAML file (`{ rules: [{id, content, enabled,
//! created_at}, ...] }`); session rules live in the `session_rules` table
//! keyed by `(session_id, id)`.

use sheetmind_core::{SessionId, Timestamp};
use sheetmind_db::{Database, Param};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A single rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier, unique within its scope.
    pub id: String,
    /// Rule body, must be non-empty.
    pub content: String,
    /// Whether the rule is currently active.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RulesFile {
    rules: Vec<Rule>,
}

/// Global rules, persisted to a YAML file on disk.
pub struct GlobalRuleStore {
    path: std::path::PathBuf,
}

impl GlobalRuleStore {
    /// Build a store backed by the YAML file at `path`.
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> StoreResult<RulesFile> {
        if !self.path.exists() {
            return Ok(RulesFile::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?;
        serde_yaml::from_str(&text).map_err(|e| crate::error::StoreError::Invariant(e.to_string()))
    }

    fn save(&self, file: &RulesFile) -> StoreResult<()> {
        let text = serde_yaml::to_string(file).map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?;
        }
        std::fs::write(&self.path, text).map_err(|e| crate::error::StoreError::Invariant(e.to_string()))
    }

    /// List all global rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn list(&self) -> StoreResult<Vec<Rule>> {
        Ok(self.load()?.rules)
    }

    /// Add a rule, rejecting empty content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Invariant`] if `content` is
    /// empty after trimming, or if the file cannot be read/written.
    pub fn add(&self, id: &str, content: &str) -> StoreResult<Rule> {
        let content = content.trim();
        if content.is_empty() {
            return Err(crate::error::StoreError::Invariant("rule content must be non-empty".into()));
        }
        let mut file = self.load()?;
        let rule = Rule {
            id: id.to_string(),
            content: content.to_string(),
            enabled: true,
            created_at: Timestamp::now(),
        };
        file.rules.push(rule.clone());
        self.save(&file)?;
        Ok(rule)
    }

    /// Remove a rule by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read/written.
    pub fn remove(&self, id: &str) -> StoreResult<()> {
        let mut file = self.load()?;
        file.rules.retain(|r| r.id != id);
        self.save(&file)
    }
}

/// Per-session rules, persisted to the `session_rules` table.
pub struct SessionRuleStore<'a> {
    db: &'a Database,
}

impl<'a> SessionRuleStore<'a> {
    /// Build a store over `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a session rule, rejecting empty content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Invariant`] if content is
    /// empty, or a store error if the insert fails.
    pub async fn add(&self, session_id: &SessionId, id: &str, content: &str) -> StoreResult<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(crate::error::StoreError::Invariant("rule content must be non-empty".into()));
        }
        self.db
            .execute(
                "INSERT OR REPLACE INTO session_rules (id, session_id, content, enabled, created_at) \
                 VALUES (?, ?, ?, 1, ?)",
                &[
                    Param::text(id),
                    Param::text(session_id.as_str()),
                    Param::text(content),
                    Param::text(Timestamp::now().to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    /// List enabled rules for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_enabled(&self, session_id: &SessionId) -> StoreResult<Vec<Rule>> {
        let rows = self
            .db
            .query(
                "SELECT id, content, enabled, created_at FROM session_rules \
                 WHERE session_id = ? AND enabled = ? ORDER BY created_at ASC, id ASC",
                &[Param::text(session_id.as_str()), Param::Bool(true)],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Rule {
                    id: row.get_named("id")?,
                    content: row.get_named("content")?,
                    enabled: row.get_named("enabled")?,
                    created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                        .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Remove a session rule by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove(&self, session_id: &SessionId, id: &str) -> StoreResult<()> {
        self.db
            .execute(
                "DELETE FROM session_rules WHERE session_id = ? AND id = ?",
                &[Param::text(session_id.as_str()), Param::text(id)],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;

    #[test]
    fn global_rules_round_trip_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let store = GlobalRuleStore::new(dir.path().join("rules.yaml"));
        store.add("always-confirm", "Always confirm before overwriting a sheet.").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        store.remove("always-confirm").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_rules_are_scoped_per_session() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = SessionRuleStore::new(&db);
        let session_id = SessionId::new();
        store.add(&session_id, "r1", "Prefer A1 notation.").await.unwrap();
        assert_eq!(store.list_enabled(&session_id).await.unwrap().len(), 1);
        assert!(store.list_enabled(&SessionId::new()).await.unwrap().is_empty());
    }
}
