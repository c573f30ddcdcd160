//! Memory entry store — categorised facts with content-hash dedup and a
//! capacity cap.

use sheetmind_core::{content_hash, memory_entry_id, Timestamp, UserId};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;
use crate::scope::UserFilter;

/// The four memory categories named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCategory {
    /// A recognised pattern in a workbook or file layout.
    FilePattern,
    /// A standing user preference.
    UserPref,
    /// A previously-seen error and how it was resolved.
    ErrorSolution,
    /// Anything else worth remembering.
    General,
}

impl MemoryCategory {
    /// The stored string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilePattern => "file_pattern",
            Self::UserPref => "user_pref",
            Self::ErrorSolution => "error_solution",
            Self::General => "general",
        }
    }

    /// Parse the stored string form, defaulting to `General` for unknown
    /// values (forward-compatible with future categories).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "file_pattern" => Self::FilePattern,
            "user_pref" => Self::UserPref,
            "error_solution" => Self::ErrorSolution,
            _ => Self::General,
        }
    }
}

/// A single remembered fact.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// 12-hex id derived from category + content prefix + timestamp.
    pub id: String,
    /// Which bucket this fact belongs to.
    pub category: MemoryCategory,
    /// The fact itself, already trimmed and non-empty.
    pub content: String,
    /// Dedup hash of the normalised content (and user scope).
    pub content_hash: String,
    /// Free-text provenance (tool name, extractor, etc).
    pub source: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Owning user, if any.
    pub user_id: Option<UserId>,
}

/// Row-level CRUD for `memory_entries`, scoped to an optional user.
pub struct MemoryStore<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
}

impl<'a> MemoryStore<'a> {
    /// Build a store scoped to `user_id`.
    #[must_use]
    pub fn new(db: &'a Database, user_id: Option<UserId>) -> Self {
        Self { db, user_id }
    }

    /// Insert a new entry, or silently do nothing if an entry with the
    /// same (category, content-hash, user) already exists.
    ///
    /// Returns `true` if a new row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is empty after trimming, or the
    /// insert fails.
    pub async fn add(&self, category: MemoryCategory, content: &str, source: &str) -> StoreResult<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Err(crate::error::StoreError::Invariant("memory content must be non-empty".into()));
        }
        let db_user_id = self.user_id.as_ref().and_then(UserId::as_db_id);
        let hash = content_hash(db_user_id, content);
        let now = Timestamp::now();
        let id = memory_entry_id(category.as_str(), content, &now.to_rfc3339());

        let affected = self
            .db
            .execute(
                "INSERT OR IGNORE INTO memory_entries (id, category, content, content_hash, source, created_at, user_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(id),
                    Param::text(category.as_str()),
                    Param::text(content),
                    Param::text(hash),
                    Param::text(source),
                    Param::text(now.to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    /// List entries in a category, ordered by `created_at` then `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_category(&self, category: MemoryCategory) -> StoreResult<Vec<MemoryEntry>> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!(
            "SELECT id, category, content, content_hash, source, created_at, user_id \
             FROM memory_entries WHERE category = ? AND {} ORDER BY created_at ASC, id ASC",
            filter.clause
        );
        let mut params = vec![Param::text(category.as_str())];
        params.extend(filter.params);
        let rows = self.db.query(&sql, &params).await?;
        rows.iter().map(row_to_entry).collect()
    }

    /// List every entry for this store's user, ordered by `created_at`
    /// then `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_all(&self) -> StoreResult<Vec<MemoryEntry>> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!(
            "SELECT id, category, content, content_hash, source, created_at, user_id \
             FROM memory_entries WHERE {} ORDER BY created_at ASC, id ASC",
            filter.clause
        );
        let rows = self.db.query(&sql, &filter.params).await?;
        rows.iter().map(row_to_entry).collect()
    }

    /// Delete an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.db.execute("DELETE FROM memory_entries WHERE id = ?", &[Param::text(id)]).await?;
        Ok(())
    }

    /// Enforce the capacity cap: if this user's row count exceeds
    /// `max_entries`, delete the oldest `total - max_entries` rows
    /// (ordered by `created_at` then `id`).
    ///
    /// # Errors
    ///
    /// Returns an error if the queries fail.
    pub async fn enforce_capacity(&self, max_entries: i64) -> StoreResult<u64> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let count_sql = format!("SELECT COUNT(*) as n FROM memory_entries WHERE {}", filter.clause);
        let total: i64 = self.db.query_one(&count_sql, &filter.params).await?.get_named("n")?;
        let overflow = total.saturating_sub(max_entries);
        if overflow <= 0 {
            return Ok(0);
        }
        let select_sql = format!(
            "SELECT id FROM memory_entries WHERE {} ORDER BY created_at ASC, id ASC LIMIT ?",
            filter.clause
        );
        let mut select_params = filter.params.clone();
        select_params.push(Param::Int(overflow));
        let stale = self.db.query(&select_sql, &select_params).await?;
        let mut deleted = 0u64;
        for row in &stale {
            let id: String = row.get_named("id")?;
            deleted += self.db.execute("DELETE FROM memory_entries WHERE id = ?", &[Param::text(id)]).await?;
        }
        Ok(deleted)
    }
}

fn row_to_entry(row: &sheetmind_db::Row) -> StoreResult<MemoryEntry> {
    Ok(MemoryEntry {
        id: row.get_named("id")?,
        category: MemoryCategory::parse(&row.get_named::<String>("category")?),
        content: row.get_named("content")?,
        content_hash: row.get_named("content_hash")?,
        source: row.get_named("source")?,
        created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
            .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
        user_id: row.get_named::<Option<String>>("user_id")?.map(UserId::Authenticated),
    })
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
    async fn add_dedups_identical_content() {
        let db = setup().await;
        let store = MemoryStore::new(&db, None);
        assert!(store.add(MemoryCategory::UserPref, "likes dark mode", "tool").await.unwrap());
        assert!(!store.add(MemoryCategory::UserPref, "  likes   dark mode  ", "tool").await.unwrap());
        assert_eq!(store.list_by_category(MemoryCategory::UserPref).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_empty_content() {
        let db = setup().await;
        let store = MemoryStore::new(&db, None);
        assert!(store.add(MemoryCategory::General, "   ", "tool").await.is_err());
    }

    #[tokio::test]
    async fn capacity_enforcement_evicts_oldest() {
        let db = setup().await;
        let store = MemoryStore::new(&db, None);
        for i in 0..5 {
            store.add(MemoryCategory::General, &format!("fact {i}"), "tool").await.unwrap();
        }
        let deleted = store.enforce_capacity(3).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }
}
