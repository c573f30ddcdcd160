//! Store error types.

use thiserror::Error;

/// Errors surfaced by the scoped stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database adapter failed.
    #[error(transparent)]
    Db(#[from] sheetmind_db::DbError),

    /// A value failed to (de)serialise to/from its stored JSON form.
    #[error("serialisation failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness or business-rule invariant was violated.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
