//! Agent turn loop, session persistence bridge, and observation
//! masking: the pieces that sit between a user's message and the LLM
//! provider / tool registry.
//!
//! [`Engine::run_turn`] is the seam callers drive: it owns the
//! iteration budget, dispatches built-in and external tool calls,
//! enriches tool results through window perception, and flushes the
//! session as it goes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod masking;
pub mod prelude;
pub mod rules;
pub mod session;
pub mod workspace_manifest;

pub use engine::{Engine, ExternalToolExecutor, NoExternalTools, MAX_TURN_ITERATIONS};
pub use error::{EngineError, EngineResult};
pub use masking::{mask_messages, FRESH_WINDOW};
pub use rules::compose_rules_block;
pub use session::{SessionBridge, AUTO_TITLE_MAX_CHARS, AUTO_TITLE_MIN_CHARS};
pub use workspace_manifest::{refresh_workspace, scan_workspace, NoopInspector, SheetInspector};
