//! Session store.

use sheetmind_core::{SessionId, Timestamp, UserId};
use sheetmind_db::{Database, Param};

use crate::error::{StoreError, StoreResult};
use crate::scope::UserFilter;

/// How a session's title was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// Generated by the title-summarisation model call.
    Auto,
    /// Set explicitly by the user.
    User,
    /// Still the default ("Untitled" / empty).
    Unset,
}

impl TitleSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::User => "user",
            Self::Unset => "unset",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "auto" => Self::Auto,
            "user" => Self::User,
            _ => Self::Unset,
        }
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Open for new turns.
    Active,
    /// Read-only, kept for history.
    Archived,
}

impl SessionStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "archived" => Self::Archived,
            _ => Self::Active,
        }
    }
}

/// A chat session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable session identifier.
    pub id: SessionId,
    /// Human-readable title.
    pub title: String,
    /// How the title was set.
    pub title_source: TitleSource,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last-updated timestamp.
    pub updated_at: Timestamp,
    /// Number of rows in `messages` for this session.
    pub message_count: i64,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Owning user, if any.
    pub user_id: Option<UserId>,
}

/// CRUD access to the `sessions` table, scoped to an optional user.
pub struct SessionStore<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
}

impl<'a> SessionStore<'a> {
    /// Build a store scoped to `user_id` (`None` for anonymous).
    #[must_use]
    pub fn new(db: &'a Database, user_id: Option<UserId>) -> Self {
        Self { db, user_id }
    }

    /// Create a new session, defaulting to an empty, unset title.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self) -> StoreResult<Session> {
        let id = SessionId::new();
        let now = Timestamp::now();
        self.db
            .execute(
                "INSERT INTO sessions (id, title, title_source, created_at, updated_at, message_count, status, user_id) \
                 VALUES (?, '', 'unset', ?, ?, 0, 'active', ?)",
                &[
                    Param::text(id.as_str()),
                    Param::text(now.to_rfc3339()),
                    Param::text(now.to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(Session {
            id,
            title: String::new(),
            title_source: TitleSource::Unset,
            created_at: now,
            updated_at: now,
            message_count: 0,
            status: SessionStatus::Active,
            user_id: self.user_id.clone(),
        })
    }

    /// Fetch a session by id, scoped to this store's user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent or owned by another user.
    pub async fn get(&self, id: &SessionId) -> StoreResult<Session> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!("SELECT id, title, title_source, created_at, updated_at, message_count, status, user_id \
                            FROM sessions WHERE id = ? AND {}", filter.clause);
        let mut params = vec![Param::text(id.as_str())];
        params.extend(filter.params);
        let row = self.db.query_optional(&sql, &params).await?.ok_or(StoreError::NotFound)?;
        Ok(Session {
            id: SessionId::from_existing(row.get_named::<String>("id")?),
            title: row.get_named("title")?,
            title_source: TitleSource::parse(&row.get_named::<String>("title_source")?),
            created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                .map_err(|e| StoreError::Invariant(e.to_string()))?,
            updated_at: Timestamp::parse_rfc3339(&row.get_named::<String>("updated_at")?)
                .map_err(|e| StoreError::Invariant(e.to_string()))?,
            message_count: row.get_named("message_count")?,
            status: SessionStatus::parse(&row.get_named::<String>("status")?),
            user_id: row
                .get_named::<Option<String>>("user_id")?
                .map(UserId::Authenticated),
        })
    }

    /// Set the title and its source, bumping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_title(&self, id: &SessionId, title: &str, source: TitleSource) -> StoreResult<()> {
        self.db
            .execute(
                "UPDATE sessions SET title = ?, title_source = ?, updated_at = ? WHERE id = ?",
                &[
                    Param::text(title),
                    Param::text(source.as_str()),
                    Param::text(Timestamp::now().to_rfc3339()),
                    Param::text(id.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Increment `message_count` and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn bump_message_count(&self, id: &SessionId) -> StoreResult<()> {
        self.db
            .execute(
                "UPDATE sessions SET message_count = message_count + 1, updated_at = ? WHERE id = ?",
                &[Param::text(Timestamp::now().to_rfc3339()), Param::text(id.as_str())],
            )
            .await?;
        Ok(())
    }

    /// Set the session's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_status(&self, id: &SessionId, status: SessionStatus) -> StoreResult<()> {
        self.db
            .execute(
                "UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?",
                &[
                    Param::text(status.as_str()),
                    Param::text(Timestamp::now().to_rfc3339()),
                    Param::text(id.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    /// List sessions for this store's user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> StoreResult<Vec<Session>> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!(
            "SELECT id, title, title_source, created_at, updated_at, message_count, status, user_id \
             FROM sessions WHERE {} ORDER BY updated_at DESC, id DESC",
            filter.clause
        );
        let rows = self.db.query(&sql, &filter.params).await?;
        rows.iter()
            .map(|row| {
                Ok(Session {
                    id: SessionId::from_existing(row.get_named::<String>("id")?),
                    title: row.get_named("title")?,
                    title_source: TitleSource::parse(&row.get_named::<String>("title_source")?),
                    created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                        .map_err(|e| StoreError::Invariant(e.to_string()))?,
                    updated_at: Timestamp::parse_rfc3339(&row.get_named::<String>("updated_at")?)
                        .map_err(|e| StoreError::Invariant(e.to_string()))?,
                    message_count: row.get_named("message_count")?,
                    status: SessionStatus::parse(&row.get_named::<String>("status")?),
                    user_id: row
                        .get_named::<Option<String>>("user_id")?
                        .map(UserId::Authenticated),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;

    async fn setup() -> Database {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let db = setup().await;
        let store = SessionStore::new(&db, None);
        let session = store.create().await.unwrap();
        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.id.as_str(), session.id.as_str());
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn sessions_are_scoped_by_user() {
        let db = setup().await;
        let alice = UserId::Authenticated("alice".into());
        let bob = UserId::Authenticated("bob".into());
        let session = SessionStore::new(&db, Some(alice.clone())).create().await.unwrap();
        let result = SessionStore::new(&db, Some(bob)).get(&session.id).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert!(SessionStore::new(&db, Some(alice)).get(&session.id).await.is_ok());
    }

    #[tokio::test]
    async fn bump_message_count_increments() {
        let db = setup().await;
        let store = SessionStore::new(&db, None);
        let session = store.create().await.unwrap();
        store.bump_message_count(&session.id).await.unwrap();
        store.bump_message_count(&session.id).await.unwrap();
        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.message_count, 2);
    }
}
