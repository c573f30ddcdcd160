//! File-backed vector store: an in-memory matrix with JSONL + packed
//! float32 binary persistence.
//!
//! Three files live under the store directory:
//! - `vectors.jsonl` — one `{content_hash, text, metadata}` object per line
//! - `vectors.bin` — the matrix, rows concatenated as little-endian f32
//! - `vectors_meta.json` — `{dimensions, count}`, used to validate the
//!   binary matrix still matches the JSONL row count on load
//!
//! Writes are atomic (tempfile in the store directory, fsync, rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetmind_core::hash::content_hash;
use tracing::warn;

use crate::error::EmbedResult;

const VECTORS_FILE: &str = "vectors.jsonl";
const VECTORS_BIN_FILE: &str = "vectors.bin";
const META_FILE: &str = "vectors_meta.json";

/// One stored embedding, with its source text and free-form metadata.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Dedup hash of the normalised text.
    pub content_hash: String,
    /// The original text that was embedded.
    pub text: String,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// Free-form metadata (category, timestamp, …).
    pub metadata: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct JsonlEntry {
    content_hash: String,
    text: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct MetaFile {
    dimensions: usize,
    count: usize,
}

/// In-memory vector matrix, backed by a directory on disk.
pub struct VectorStore {
    store_dir: PathBuf,
    dimensions: usize,
    records: Vec<VectorRecord>,
    hash_index: HashMap<String, usize>,
    matrix_cache: Option<Vec<Vec<f32>>>,
    dirty: bool,
}

impl VectorStore {
    /// Open (or create) a store rooted at `store_dir`, loading any
    /// existing records.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an
    /// existing file cannot be read.
    pub fn open(store_dir: impl Into<PathBuf>, dimensions: usize) -> EmbedResult<Self> {
        let store_dir = store_dir.into();
        std::fs::create_dir_all(&store_dir)?;
        let mut store = Self {
            store_dir,
            dimensions,
            records: Vec::new(),
            hash_index: HashMap::new(),
            matrix_cache: None,
            dirty: false,
        };
        store.load()?;
        Ok(store)
    }

    /// The fixed vector width every row stores.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of records currently stored.
    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// `true` if `text` has already been embedded (by content hash).
    #[must_use]
    pub fn has(&self, text: &str) -> bool {
        self.hash_index.contains_key(&content_hash(None, text))
    }

    /// Every record's row, in insertion order, rebuilding the cache if
    /// the record count has drifted since the last build.
    #[must_use]
    pub fn matrix(&mut self) -> &[Vec<f32>] {
        let stale = self.matrix_cache.as_ref().is_none_or(|m| m.len() != self.records.len());
        if stale {
            self.matrix_cache = Some(self.records.iter().map(|r| r.vector.clone()).collect());
        }
        self.matrix_cache.as_deref().unwrap_or(&[])
    }

    /// Insert one record, deduping by content hash. Returns `true` if a
    /// new row was added.
    pub fn add(&mut self, text: &str, vector: Vec<f32>, metadata: serde_json::Value) -> bool {
        let hash = content_hash(None, text);
        if self.hash_index.contains_key(&hash) {
            return false;
        }
        let idx = self.records.len();
        self.records.push(VectorRecord { content_hash: hash.clone(), text: text.to_string(), vector, metadata });
        self.hash_index.insert(hash, idx);
        self.matrix_cache = None;
        self.dirty = true;
        true
    }

    /// Batch-insert texts with their already-computed vectors and
    /// metadata, returning the number of genuinely new rows. Rows beyond
    /// the shorter of `texts`/`vectors`/`metadata` are ignored.
    pub fn add_batch(&mut self, texts: &[String], vectors: &[Vec<f32>], metadata: &[serde_json::Value]) -> usize {
        let mut added = 0;
        for (i, text) in texts.iter().enumerate() {
            let Some(vector) = vectors.get(i) else { break };
            let meta = metadata.get(i).cloned().unwrap_or(serde_json::json!({}));
            if self.add(text, vector.clone(), meta) {
                added += 1;
            }
        }
        added
    }

    /// Every stored text, in insertion order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.text.as_str()).collect()
    }

    /// Fetch a record by row index.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&VectorRecord> {
        self.records.get(index)
    }

    /// Drop every record (does not touch disk until [`Self::save`]).
    pub fn clear(&mut self) {
        self.records.clear();
        self.hash_index.clear();
        self.matrix_cache = None;
        self.dirty = true;
    }

    /// Persist the current in-memory state to disk, if it has changed
    /// since the last save.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three files cannot be written.
    pub fn save(&mut self) -> EmbedResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let jsonl = self
            .records
            .iter()
            .map(|r| {
                serde_json::to_string(&JsonlEntry {
                    content_hash: r.content_hash.clone(),
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        atomic_write(&self.store_dir, VECTORS_FILE, jsonl.as_bytes())?;

        let mut bin = Vec::with_capacity(self.records.len() * self.dimensions * 4);
        for record in &self.records {
            bin.extend(pack_vector(&record.vector));
        }
        atomic_write(&self.store_dir, VECTORS_BIN_FILE, &bin)?;

        let meta = serde_json::to_string(&MetaFile { dimensions: self.dimensions, count: self.records.len() })?;
        atomic_write(&self.store_dir, META_FILE, meta.as_bytes())?;

        self.dirty = false;
        Ok(())
    }

    fn load(&mut self) -> EmbedResult<()> {
        let jsonl_path = self.store_dir.join(VECTORS_FILE);
        if !jsonl_path.exists() {
            return Ok(());
        }

        let text = std::fs::read_to_string(&jsonl_path)?;
        let entries: Vec<JsonlEntry> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<JsonlEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed vector store record");
                    None
                },
            })
            .collect();
        if entries.is_empty() {
            return Ok(());
        }

        let bin_path = self.store_dir.join(VECTORS_BIN_FILE);
        let vectors = std::fs::read(&bin_path).ok().and_then(|bytes| {
            let rows = unpack_matrix(&bytes, self.dimensions);
            (rows.len() == entries.len()).then_some(rows)
        });
        if vectors.is_none() && bin_path.exists() {
            warn!("vector matrix row count mismatch, discarding cached vectors");
        }

        for (i, entry) in entries.into_iter().enumerate() {
            let vector = vectors.as_ref().and_then(|v| v.get(i)).cloned().unwrap_or_else(|| vec![0.0; self.dimensions]);
            let idx = self.records.len();
            self.records.push(VectorRecord {
                content_hash: entry.content_hash.clone(),
                text: entry.text,
                vector,
                metadata: entry.metadata,
            });
            self.hash_index.insert(entry.content_hash, idx);
        }
        Ok(())
    }
}

fn atomic_write(dir: &Path, filename: &str, content: &[u8]) -> std::io::Result<()> {
    let path = dir.join(filename);
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::fs::write(tmp.path(), content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(())
}

fn pack_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn unpack_matrix(bytes: &[u8], dimensions: usize) -> Vec<Vec<f32>> {
    if dimensions == 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(dimensions * 4)
        .map(|row| row.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_dedups_by_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path(), 2).unwrap();
        assert!(store.add("hello world", vec![1.0, 2.0], serde_json::json!({})));
        assert!(!store.add("hello   world", vec![3.0, 4.0], serde_json::json!({})));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn add_batch_returns_new_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path(), 1).unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let vectors = vec![vec![1.0], vec![2.0], vec![1.0]];
        let metadata = vec![serde_json::json!({}), serde_json::json!({}), serde_json::json!({})];
        assert_eq!(store.add_batch(&texts, &vectors, &metadata), 2);
    }

    #[test]
    fn save_then_reopen_round_trips_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let vector = vec![0.1_f32, -2.5, f32::MIN_POSITIVE, 123_456.789];
        {
            let mut store = VectorStore::open(dir.path(), 4).unwrap();
            store.add("hello world", vector.clone(), serde_json::json!({"k": "v"}));
            store.save().unwrap();
        }
        let mut reopened = VectorStore::open(dir.path(), 4).unwrap();
        assert_eq!(reopened.size(), 1);
        assert_eq!(reopened.matrix()[0], vector);
        assert_eq!(reopened.record(0).unwrap().metadata, serde_json::json!({"k": "v"}));
    }

    #[test]
    fn matrix_rebuilds_lazily_after_add() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path(), 1).unwrap();
        assert!(store.matrix().is_empty());
        store.add("a", vec![1.0], serde_json::json!({}));
        assert_eq!(store.matrix(), &[vec![1.0]]);
    }
}
