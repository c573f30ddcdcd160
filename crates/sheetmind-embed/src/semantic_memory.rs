//! Semantic memory: an embedding-indexed enhancement layer over
//! [`PersistentMemory`], independent of which storage backend it uses.
//!
//! Falls back to [`PersistentMemory::load_core`] whenever the embedding
//! provider is unavailable or errors, so a broken API key degrades
//! gracefully instead of losing recall entirely.

use sheetmind_memory::{MemoryStorageBackend, ParsedEntry, PersistentMemory};
use tracing::{info, warn};

use crate::client::{EmbeddingClient, EmbeddingProvider};
use crate::search::cosine_top_k;
use crate::store::VectorStore;

/// Default number of semantic hits surfaced per query.
pub const DEFAULT_TOP_K: usize = 10;
/// Default minimum cosine similarity for a hit to count.
pub const DEFAULT_THRESHOLD: f32 = 0.3;
/// Default number of most-recent entries appended as a safety net.
pub const DEFAULT_FALLBACK_RECENT: usize = 5;

/// Embedding-backed semantic search layered over a [`PersistentMemory`].
pub struct SemanticMemory<'a, B: MemoryStorageBackend, P: EmbeddingProvider> {
    memory: &'a PersistentMemory<B>,
    client: &'a EmbeddingClient<P>,
    store: VectorStore,
    top_k: usize,
    threshold: f32,
    fallback_recent: usize,
    synced: bool,
}

impl<'a, B: MemoryStorageBackend, P: EmbeddingProvider> SemanticMemory<'a, B, P> {
    /// Wrap `memory` with semantic search, persisting the vector index
    /// under `vectors_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store directory cannot be opened.
    pub fn new(
        memory: &'a PersistentMemory<B>,
        client: &'a EmbeddingClient<P>,
        vectors_dir: impl Into<std::path::PathBuf>,
    ) -> crate::error::EmbedResult<Self> {
        Ok(Self {
            memory,
            client,
            store: VectorStore::open(vectors_dir, client.dimensions())?,
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            fallback_recent: DEFAULT_FALLBACK_RECENT,
            synced: false,
        })
    }

    /// Override the number of semantic hits returned per query.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Override the minimum similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override the number of recent entries appended as a fallback.
    #[must_use]
    pub fn with_fallback_recent(mut self, fallback_recent: usize) -> Self {
        self.fallback_recent = fallback_recent;
        self
    }

    /// The underlying vector store, for tests or advanced callers.
    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Index every memory entry not already embedded (by content hash).
    /// Returns the number of newly indexed entries.
    ///
    /// Marks the index synced even on failure, so a broken provider
    /// isn't retried on every call — only explicit re-sync retries it.
    pub async fn sync_index(&mut self) -> crate::error::EmbedResult<usize> {
        let entries = self.memory.list_entries(None).await?;
        if entries.is_empty() {
            self.synced = true;
            return Ok(0);
        }
        let added = self.index_new(&entries).await;
        self.synced = true;
        added
    }

    /// Index newly-written entries (call right after
    /// [`PersistentMemory::save`]). Returns the number of newly indexed
    /// entries.
    pub async fn index_entries(&mut self, entries: &[ParsedEntry]) -> crate::error::EmbedResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.index_new(entries).await
    }

    async fn index_new(&mut self, entries: &[ParsedEntry]) -> crate::error::EmbedResult<usize> {
        let mut new_texts = Vec::new();
        let mut new_metadata = Vec::new();
        for entry in entries {
            if !self.store.has(&entry.content) {
                new_texts.push(entry.content.clone());
                new_metadata.push(serde_json::json!({
                    "category": format!("{:?}", entry.category),
                    "timestamp": entry.timestamp.and_utc().to_rfc3339(),
                }));
            }
        }
        if new_texts.is_empty() {
            return Ok(0);
        }

        match self.client.embed(&new_texts).await {
            Ok(vectors) => {
                let added = self.store.add_batch(&new_texts, &vectors, &new_metadata);
                self.store.save()?;
                info!(added, "semantic memory index synced");
                Ok(added)
            },
            Err(e) => {
                warn!(error = %e, "semantic memory index sync failed, degrading to recency fallback");
                Ok(0)
            },
        }
    }

    /// Semantic search, rendered as markdown: a "Semantically related"
    /// section from embedding top-k, plus a "Recent" section of the
    /// last `fallback_recent` entries not already surfaced.
    ///
    /// Falls back to [`PersistentMemory::load_core`] if the index is
    /// empty or the query can't be embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying memory store fails to read.
    pub async fn search(&mut self, query: &str) -> crate::error::EmbedResult<String> {
        if !self.synced {
            self.sync_index().await?;
        }
        if self.store.size() == 0 {
            return Ok(self.memory.load_core().await?);
        }

        let Ok(query_vec) = self.client.embed_single(query).await else {
            warn!("semantic query embedding failed, degrading to recency fallback");
            return Ok(self.memory.load_core().await?);
        };

        let matrix = self.store.matrix().to_vec();
        let results = cosine_top_k(&query_vec, &matrix, self.top_k, self.threshold);

        let mut semantic_texts = Vec::new();
        for r in &results {
            if let Some(record) = self.store.record(r.index) {
                semantic_texts.push(record.text.clone());
            }
        }

        let all_entries = self.memory.list_entries(None).await?;
        let recent_start = all_entries.len().saturating_sub(self.fallback_recent);
        let recent_texts: Vec<&str> = all_entries[recent_start..]
            .iter()
            .map(|e| e.content.as_str())
            .filter(|text| !semantic_texts.iter().any(|s| s == text))
            .collect();

        let mut parts = Vec::new();
        if !semantic_texts.is_empty() {
            parts.push("### Semantically related memory".to_string());
            parts.extend(semantic_texts.iter().map(|t| format!("- {t}")));
        }
        if !recent_texts.is_empty() {
            parts.push("\n### Recent memory".to_string());
            parts.extend(recent_texts.iter().map(|t| format!("- {t}")));
        }

        if parts.is_empty() {
            Ok(self.memory.load_core().await?)
        } else {
            Ok(parts.join("\n"))
        }
    }

    /// Semantic search returning `(entry, score)` pairs, for callers that
    /// need more than rendered markdown (e.g. relevance filtering).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying memory store fails to read.
    pub async fn search_entries(
        &mut self,
        query: &str,
        k: Option<usize>,
        threshold: Option<f32>,
    ) -> crate::error::EmbedResult<Vec<(ParsedEntry, f32)>> {
        if !self.synced {
            self.sync_index().await?;
        }
        if self.store.size() == 0 {
            return Ok(Vec::new());
        }

        let Ok(query_vec) = self.client.embed_single(query).await else {
            return Ok(Vec::new());
        };

        let matrix = self.store.matrix().to_vec();
        let results = cosine_top_k(&query_vec, &matrix, k.unwrap_or(self.top_k), threshold.unwrap_or(self.threshold));

        let all_entries = self.memory.list_entries(None).await?;
        let mut output = Vec::new();
        for r in results {
            let Some(record) = self.store.record(r.index) else { continue };
            if let Some(entry) = all_entries.iter().find(|e| e.content == record.text) {
                output.push((entry.clone(), r.score));
            }
        }
        Ok(output)
    }
}
