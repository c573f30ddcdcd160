//! DB-backed vector record store: one blob per row, packed as
//! little-endian float32 so the round-trip is bit-exact.

use sheetmind_core::{content_hash, Timestamp, UserId};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;
use crate::scope::UserFilter;

/// A single embedded record.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Dedup hash of the normalised source text.
    pub content_hash: String,
    /// The original text.
    pub text: String,
    /// Free-form metadata (source file, category, etc).
    pub metadata: serde_json::Value,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// `vector.len()`, stored redundantly for fast filtering.
    pub dimensions: i64,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Owning user, if any.
    pub user_id: Option<UserId>,
}

/// Pack a float32 vector into its little-endian byte representation.
#[must_use]
pub fn pack_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Unpack a little-endian float32 byte blob back into a vector.
#[must_use]
pub fn unpack_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// CRUD access to the `vector_records` table.
pub struct VectorStore<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
}

impl<'a> VectorStore<'a> {
    /// Build a store scoped to `user_id`.
    #[must_use]
    pub fn new(db: &'a Database, user_id: Option<UserId>) -> Self {
        Self { db, user_id }
    }

    /// Insert one record, deduping on content hash. Returns `true` if a
    /// new row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add(&self, text: &str, vector: &[f32], metadata: &serde_json::Value) -> StoreResult<bool> {
        let db_user_id = self.user_id.as_ref().and_then(UserId::as_db_id);
        let hash = content_hash(db_user_id, text);
        let affected = self
            .db
            .execute(
                "INSERT OR IGNORE INTO vector_records (content_hash, text, metadata, vector, dimensions, created_at, user_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(&hash),
                    Param::text(text),
                    Param::text(metadata.to_string()),
                    Param::Blob(pack_vector(vector)),
                    Param::Int(vector.len() as i64),
                    Param::text(Timestamp::now().to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Batch-insert texts with their already-computed vectors and
    /// metadata, returning the number of genuinely new rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Invariant`] if the three
    /// slices have mismatched lengths, or a store error if any insert
    /// fails.
    pub async fn add_batch(
        &self,
        texts: &[String],
        vectors: &[Vec<f32>],
        metadata: &[serde_json::Value],
    ) -> StoreResult<u64> {
        if texts.len() != vectors.len() || texts.len() != metadata.len() {
            return Err(crate::error::StoreError::Invariant(
                "texts, vectors and metadata must have equal length".into(),
            ));
        }
        let mut new_rows = 0u64;
        for ((text, vector), meta) in texts.iter().zip(vectors).zip(metadata) {
            if self.add(text, vector, meta).await? {
                new_rows += 1;
            }
        }
        Ok(new_rows)
    }

    /// Fetch every record for this store's user, ordered by id (insertion
    /// order) — the shape a lazily-rebuilt in-memory matrix reads back.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_all(&self) -> StoreResult<Vec<VectorRecord>> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!(
            "SELECT content_hash, text, metadata, vector, dimensions, created_at, user_id \
             FROM vector_records WHERE {} ORDER BY id ASC",
            filter.clause
        );
        let rows = self.db.query(&sql, &filter.params).await?;
        rows.iter()
            .map(|row| {
                Ok(VectorRecord {
                    content_hash: row.get_named("content_hash")?,
                    text: row.get_named("text")?,
                    metadata: serde_json::from_str(&row.get_named::<String>("metadata")?)?,
                    vector: unpack_vector(&row.get_named::<Vec<u8>>("vector")?),
                    dimensions: row.get_named("dimensions")?,
                    created_at: Timestamp::parse_rfc3339(&row.get_named::<String>("created_at")?)
                        .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
                    user_id: row.get_named::<Option<String>>("user_id")?.map(UserId::Authenticated),
                })
            })
            .collect()
    }

    /// Row count for this store's user — the signal an in-memory matrix
    /// cache watches to decide whether it must rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count(&self) -> StoreResult<i64> {
        let filter = UserFilter::for_user(self.user_id.as_ref());
        let sql = format!("SELECT COUNT(*) as n FROM vector_records WHERE {}", filter.clause);
        let row = self.db.query_one(&sql, &filter.params).await?;
        Ok(row.get_named("n")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;
    use serde_json::json;

    #[tokio::test]
    async fn vector_round_trips_bit_exact() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = VectorStore::new(&db, None);
        let vector = vec![0.1_f32, -2.5, f32::MIN_POSITIVE, 123_456.789];
        store.add("hello world", &vector, &json!({})).await.unwrap();
        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vector, vector);
    }

    #[tokio::test]
    async fn add_dedups_by_content_hash() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = VectorStore::new(&db, None);
        assert!(store.add("same text", &[1.0], &json!({})).await.unwrap());
        assert!(!store.add("same text", &[2.0], &json!({})).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_batch_returns_new_row_count() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = VectorStore::new(&db, None);
        let texts = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let vectors = vec![vec![1.0], vec![2.0], vec![1.0]];
        let metadata = vec![json!({}), json!({}), json!({})];
        let new_rows = store.add_batch(&texts, &vectors, &metadata).await.unwrap();
        assert_eq!(new_rows, 2);
    }
}
