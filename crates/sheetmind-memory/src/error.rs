//! Memory subsystem error types.

use thiserror::Error;

/// Errors raised by the persistent memory layer.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A filesystem operation on the markdown backend failed.
    #[error("memory file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The database-backed store reported an error.
    #[error(transparent)]
    Store(#[from] sheetmind_stores::StoreError),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
