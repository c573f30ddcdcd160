//! Sheetmind Stores — one small CRUD type per domain table, each
//! parameterised by an optional user identity via [`scope::UserFilter`].
//!
//! Every user-owned table branches its `WHERE` clause on whether the
//! caller is anonymous (`user_id IS NULL`) or authenticated (`user_id =
//! ?`). Session-owned tables (`messages`, `session_rules`,
//! `session_checkpoints`) key off the session id instead and don't carry
//! their own `user_id` scope.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod audit;
pub mod checkpoints;
pub mod config;
pub mod error;
pub mod memory;
pub mod messages;
pub mod rules;
pub mod scope;
pub mod sessions;
pub mod vectors;
pub mod workspace_files;

pub use audit::{AuditLogStore, LlmCallLogEntry, ToolCallLogEntry};
pub use checkpoints::{Checkpoint, CheckpointStore, CheckpointType};
pub use config::{ConfigStore, ModelProfileStore, UserConfigStore};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCategory, MemoryEntry, MemoryStore};
pub use messages::{Message, MessageStore, Role};
pub use rules::{GlobalRuleStore, Rule, SessionRuleStore};
pub use scope::UserFilter;
pub use sessions::{Session, SessionStatus, SessionStore, TitleSource};
pub use vectors::{pack_vector, unpack_vector, VectorRecord, VectorStore};
pub use workspace_files::{SheetSummary, WorkspaceFileRecord, WorkspaceFileStore};
