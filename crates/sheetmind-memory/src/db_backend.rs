//! Database-backed [`MemoryStorageBackend`], wrapping
//! [`sheetmind_stores::MemoryStore`].

use async_trait::async_trait;
use sheetmind_core::UserId;
use sheetmind_db::Database;
use sheetmind_stores::{MemoryCategory, MemoryStore};

use crate::backend::MemoryStorageBackend;
use crate::error::MemoryResult;
use crate::markdown::ParsedEntry;

/// The capacity cap enforced on every write.
pub const DEFAULT_MAX_ENTRIES: i64 = 2000;

/// Memory backed by the `memory_entries` table.
///
/// Owns a cloned [`Database`] handle (cheap — the connection pool is
/// reference-counted) rather than borrowing one, so it can be boxed into
/// a `'static` `PersistentMemory` and bound into the per-request
/// task-local the tools surface resolves against.
pub struct DbMemoryBackend {
    db: Database,
    user_id: Option<UserId>,
    max_entries: i64,
}

impl DbMemoryBackend {
    /// Build a backend over `db`, scoped to `user_id`.
    #[must_use]
    pub fn new(db: Database, user_id: Option<UserId>) -> Self {
        Self {
            db,
            user_id,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Override the capacity cap (tests, small deployments).
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: i64) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn store(&self) -> MemoryStore<'_> {
        MemoryStore::new(&self.db, self.user_id.clone())
    }
}

fn to_parsed(entry: &sheetmind_stores::MemoryEntry) -> ParsedEntry {
    ParsedEntry {
        category: entry.category,
        content: entry.content.clone(),
        timestamp: entry.created_at.0.naive_utc(),
    }
}

#[async_trait]
impl MemoryStorageBackend for DbMemoryBackend {
    async fn load_core(&self, limit: usize) -> MemoryResult<String> {
        let mut entries = self.store().list_all().await?;
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
        Ok(crate::markdown::format_entries(&entries.iter().map(to_parsed).collect::<Vec<_>>()))
    }

    async fn load_by_category(&self, category: MemoryCategory) -> MemoryResult<Vec<ParsedEntry>> {
        Ok(self.store().list_by_category(category).await?.iter().map(to_parsed).collect())
    }

    async fn load_all(&self) -> MemoryResult<Vec<ParsedEntry>> {
        Ok(self.store().list_all().await?.iter().map(to_parsed).collect())
    }

    async fn save_entries(&self, entries: Vec<ParsedEntry>, source: &str) -> MemoryResult<()> {
        let store = self.store();
        for entry in entries {
            store.add(entry.category, &entry.content, source).await?;
        }
        store.enforce_capacity(self.max_entries).await?;
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> MemoryResult<bool> {
        self.store().delete(id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use sheetmind_db::migrate;

    fn entry(category: MemoryCategory, content: &str) -> ParsedEntry {
        ParsedEntry {
            category,
            content: content.to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-01 12:00", "%Y-%m-%d %H:%M").unwrap(),
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trips() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let backend = DbMemoryBackend::new(db, None);
        backend.save_entries(vec![entry(MemoryCategory::UserPref, "likes dark mode")], "tool").await.unwrap();
        let entries = backend.load_by_category(MemoryCategory::UserPref).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn capacity_cap_is_enforced_on_save() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let backend = DbMemoryBackend::new(db, None).with_max_entries(3);
        for i in 0..5 {
            backend.save_entries(vec![entry(MemoryCategory::General, &format!("fact {i}"))], "tool").await.unwrap();
        }
        assert_eq!(backend.load_all().await.unwrap().len(), 3);
    }
}
