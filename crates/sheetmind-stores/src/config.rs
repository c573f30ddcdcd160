//! Key/value configuration stores and model profiles.
//!
//! Unlike the astrid-config file-precedence loader this replaces, runtime
//! configuration here is DB-backed only: `config_kv` for instance-wide
//! settings, `user_config_kv` for per-user overrides, `model_profiles`
//! for named LLM configurations.

use sheetmind_core::UserId;
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;

/// Instance-wide key/value configuration.
pub struct ConfigStore<'a> {
    db: &'a Database,
}

impl<'a> ConfigStore<'a> {
    /// Build a store over `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Fetch a value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let row = self.db.query_optional("SELECT value FROM config_kv WHERE key = ?", &[Param::text(key)]).await?;
        row.map(|r| r.get_named("value")).transpose().map_err(Into::into)
    }

    /// Set a value, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT OR REPLACE INTO config_kv (key, value) VALUES (?, ?)",
                &[Param::text(key), Param::text(value)],
            )
            .await?;
        Ok(())
    }
}

/// Per-user key/value configuration overrides.
pub struct UserConfigStore<'a> {
    db: &'a Database,
    user_id: UserId,
}

impl<'a> UserConfigStore<'a> {
    /// Build a store scoped to `user_id`.
    #[must_use]
    pub fn new(db: &'a Database, user_id: UserId) -> Self {
        Self { db, user_id }
    }

    /// Fetch a value by key for this user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let Some(uid) = self.user_id.as_db_id() else { return Ok(None) };
        let row = self
            .db
            .query_optional(
                "SELECT value FROM user_config_kv WHERE user_id = ? AND key = ?",
                &[Param::text(uid), Param::text(key)],
            )
            .await?;
        row.map(|r| r.get_named("value")).transpose().map_err(Into::into)
    }

    /// Set a value for this user, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Invariant`] if the user is
    /// anonymous (anonymous users have no per-user overrides), or a
    /// store error if the upsert fails.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let uid = self
            .user_id
            .as_db_id()
            .ok_or_else(|| crate::error::StoreError::Invariant("anonymous users cannot have config overrides".into()))?;
        self.db
            .execute(
                "INSERT OR REPLACE INTO user_config_kv (user_id, key, value) VALUES (?, ?, ?)",
                &[Param::text(uid), Param::text(key), Param::text(value)],
            )
            .await?;
        Ok(())
    }
}

/// Named LLM configuration profiles (`model_profiles`).
pub struct ModelProfileStore<'a> {
    db: &'a Database,
}

impl<'a> ModelProfileStore<'a> {
    /// Build a store over `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Fetch a profile's configuration by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or JSON decode fails.
    pub async fn get(&self, name: &str) -> StoreResult<Option<serde_json::Value>> {
        let row = self
            .db
            .query_optional("SELECT config_json FROM model_profiles WHERE name = ?", &[Param::text(name)])
            .await?;
        row.map(|r| Ok(serde_json::from_str(&r.get_named::<String>("config_json")?)?)).transpose()
    }

    /// Upsert a named profile's configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn set(&self, name: &str, config: &serde_json::Value) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT OR REPLACE INTO model_profiles (name, config_json) VALUES (?, ?)",
                &[Param::text(name), Param::text(config.to_string())],
            )
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
    async fn config_kv_round_trips() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = ConfigStore::new(&db);
        store.set("default_model", "claude").await.unwrap();
        assert_eq!(store.get("default_model").await.unwrap(), Some("claude".to_string()));
    }

    #[tokio::test]
    async fn anonymous_user_config_set_is_rejected() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = UserConfigStore::new(&db, UserId::Anonymous);
        assert!(store.set("theme", "dark").await.is_err());
    }

    #[tokio::test]
    async fn model_profile_round_trips() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = ModelProfileStore::new(&db);
        store.set("fast", &json!({"model": "haiku", "temperature": 0.2})).await.unwrap();
        let fetched = store.get("fast").await.unwrap().unwrap();
        assert_eq!(fetched["model"], "haiku");
    }
}
