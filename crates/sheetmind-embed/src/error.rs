//! Embedding subsystem error types.

use thiserror::Error;

/// Errors raised by the embedding client or vector store.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The provider has no API key configured.
    #[error("API key not configured for {provider}")]
    ApiKeyNotConfigured {
        /// Provider name.
        provider: String,
    },

    /// The underlying HTTP request failed.
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    /// A batch request exceeded its timeout.
    #[error("embedding request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The provider returned a response this client could not parse.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Reading or writing the vector store's files failed.
    #[error("vector store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The vector store's JSONL metadata was malformed.
    #[error("vector store metadata corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    /// The memory layer backing semantic search failed.
    #[error(transparent)]
    Memory(#[from] sheetmind_memory::MemoryError),
}

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;
