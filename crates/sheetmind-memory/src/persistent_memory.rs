//! The facade every other crate talks to. Holds no storage logic of its
//! own — everything is delegated to an injected
//! [`MemoryStorageBackend`], chosen by whoever constructs it (file
//! backend for legacy deployments, DB backend otherwise).

use sheetmind_stores::MemoryCategory;

use crate::backend::MemoryStorageBackend;
use crate::error::MemoryResult;
use crate::markdown::{format_entries, parse_entries, ParsedEntry};
use crate::topics::infer_category_by_filename;

/// Default number of lines `load_core` returns when the caller doesn't
/// override it.
pub const DEFAULT_AUTO_LOAD_LINES: usize = 200;

/// Persistent memory: categorised facts, backend-agnostic.
pub struct PersistentMemory<B: MemoryStorageBackend> {
    backend: B,
    auto_load_lines: usize,
}

impl<B: MemoryStorageBackend> PersistentMemory<B> {
    /// Wrap `backend`, using [`DEFAULT_AUTO_LOAD_LINES`] for `load_core`.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend, auto_load_lines: DEFAULT_AUTO_LOAD_LINES }
    }

    /// Wrap `backend` with a custom `load_core` line budget.
    #[must_use]
    pub fn with_auto_load_lines(backend: B, auto_load_lines: usize) -> Self {
        Self { backend, auto_load_lines }
    }

    /// `true` if the backend is currently rejecting writes.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.backend.read_only()
    }

    /// Load the aggregate core memory text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub async fn load_core(&self) -> MemoryResult<String> {
        self.backend.load_core(self.auto_load_lines).await
    }

    /// Load memory for a named topic file (`memory_read_topic`'s
    /// argument), resolved back to its category.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub async fn load_topic(&self, topic_name: &str) -> MemoryResult<String> {
        let Some(category) = infer_category_by_filename(topic_name) else {
            return Ok(String::new());
        };
        let entries = self.backend.load_by_category(category).await?;
        if entries.is_empty() {
            return Ok(String::new());
        }
        Ok(format_entries(&entries))
    }

    /// Save one entry (`memory_save`'s entry point), tagged with `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    pub async fn save(&self, category: MemoryCategory, content: &str, source: &str) -> MemoryResult<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        let entry = ParsedEntry {
            category,
            content: content.to_string(),
            timestamp: chrono::Utc::now().naive_utc(),
        };
        self.backend.save_entries(vec![entry], source).await
    }

    /// List entries, optionally filtered to one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub async fn list_entries(&self, category: Option<MemoryCategory>) -> MemoryResult<Vec<ParsedEntry>> {
        match category {
            Some(category) => self.backend.load_by_category(category).await,
            None => self.backend.load_all().await,
        }
    }

    /// Delete an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    pub async fn delete_entry(&self, id: &str) -> MemoryResult<bool> {
        self.backend.delete_entry(id).await
    }

    /// Serialise entries to markdown (kept for backward-compatible
    /// callers that round-trip through the file format directly).
    #[must_use]
    pub fn format_entries(entries: &[ParsedEntry]) -> String {
        format_entries(entries)
    }

    /// Parse markdown back into entries.
    #[must_use]
    pub fn parse_entries(content: &str) -> Vec<ParsedEntry> {
        parse_entries(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_backend::FileMemoryBackend;

    #[tokio::test]
    async fn save_then_load_topic_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let memory = PersistentMemory::new(FileMemoryBackend::new(dir.path()).unwrap());
        memory.save(MemoryCategory::UserPref, "likes dark mode", "tool").await.unwrap();
        let topic = memory.load_topic("user_prefs.md").await.unwrap();
        assert!(topic.contains("likes dark mode"));
    }

    #[tokio::test]
    async fn save_ignores_blank_content() {
        let dir = tempfile::tempdir().unwrap();
        let memory = PersistentMemory::new(FileMemoryBackend::new(dir.path()).unwrap());
        memory.save(MemoryCategory::General, "   ", "tool").await.unwrap();
        assert!(memory.list_entries(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_name_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let memory = PersistentMemory::new(FileMemoryBackend::new(dir.path()).unwrap());
        assert_eq!(memory.load_topic("nonexistent.md").await.unwrap(), "");
    }
}
