//! Persistent categorised memory: markdown-file and database backends
//! behind one facade.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod db_backend;
pub mod error;
pub mod extractor;
pub mod file_backend;
pub mod ids;
pub mod markdown;
pub mod persistent_memory;
pub mod topics;

pub use backend::MemoryStorageBackend;
pub use db_backend::{DbMemoryBackend, DEFAULT_MAX_ENTRIES};
pub use error::{MemoryError, MemoryResult};
pub use extractor::{ExtractedMemory, MemoryExtractor};
pub use file_backend::FileMemoryBackend;
pub use ids::entry_id;
pub use markdown::{dedupe_new_entries, format_entries, parse_entries, ParsedEntry};
pub use persistent_memory::{PersistentMemory, DEFAULT_AUTO_LOAD_LINES};
pub use topics::{infer_category_by_filename, topic_file, CORE_MEMORY_FILE};
