//! Batched embedding client, file-backed vector index, and the semantic
//! memory facade built on top of both.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod client;
pub mod error;
pub mod openai;
pub mod search;
pub mod semantic_memory;
pub mod store;

pub use client::{EmbeddingClient, EmbeddingProvider, DEFAULT_TIMEOUT, MAX_BATCH_SIZE};
pub use error::{EmbedError, EmbedResult};
pub use openai::{OpenAiEmbeddingProvider, DEFAULT_DIMENSIONS, DEFAULT_MODEL};
pub use search::{cosine_top_k, SearchResult};
pub use semantic_memory::SemanticMemory;
pub use store::{VectorRecord, VectorStore};
