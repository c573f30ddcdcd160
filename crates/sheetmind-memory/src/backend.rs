//! The storage-backend seam [`PersistentMemory`](crate::PersistentMemory)
//! is built against — either the markdown file backend or the database.

use async_trait::async_trait;
use sheetmind_stores::MemoryCategory;

use crate::error::MemoryResult;
use crate::markdown::ParsedEntry;

/// Storage operations a memory backend must provide. `PersistentMemory`
/// holds only formatting/dedup logic; every actual read or write goes
/// through this trait.
#[async_trait]
pub trait MemoryStorageBackend: Send + Sync {
    /// Load the core aggregate memory text, capped to roughly `limit`
    /// lines (backends that have no line-oriented notion of "core" may
    /// ignore `limit` and return everything).
    async fn load_core(&self, limit: usize) -> MemoryResult<String>;

    /// Load every entry in one category.
    async fn load_by_category(&self, category: MemoryCategory) -> MemoryResult<Vec<ParsedEntry>>;

    /// Load every entry, across all categories.
    async fn load_all(&self) -> MemoryResult<Vec<ParsedEntry>>;

    /// Persist new entries, each tagged with `source`. Backends are
    /// responsible for their own dedup and capacity enforcement.
    async fn save_entries(&self, entries: Vec<ParsedEntry>, source: &str) -> MemoryResult<()>;

    /// Delete an entry by id. Returns `true` if a row was removed.
    async fn delete_entry(&self, id: &str) -> MemoryResult<bool>;

    /// `true` if writes are currently suppressed (degraded mode).
    fn read_only(&self) -> bool {
        false
    }
}

/// Blanket implementation so `Box<dyn MemoryStorageBackend>` can stand in
/// for `B: MemoryStorageBackend` wherever a type-erased handle is needed
/// (e.g. a `PersistentMemory` shared across tool calls via a task-local).
#[async_trait]
impl MemoryStorageBackend for Box<dyn MemoryStorageBackend> {
    async fn load_core(&self, limit: usize) -> MemoryResult<String> {
        (**self).load_core(limit).await
    }

    async fn load_by_category(&self, category: MemoryCategory) -> MemoryResult<Vec<ParsedEntry>> {
        (**self).load_by_category(category).await
    }

    async fn load_all(&self) -> MemoryResult<Vec<ParsedEntry>> {
        (**self).load_all().await
    }

    async fn save_entries(&self, entries: Vec<ParsedEntry>, source: &str) -> MemoryResult<()> {
        (**self).save_entries(entries, source).await
    }

    async fn delete_entry(&self, id: &str) -> MemoryResult<bool> {
        (**self).delete_entry(id).await
    }

    fn read_only(&self) -> bool {
        (**self).read_only()
    }
}
