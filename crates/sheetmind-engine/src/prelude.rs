//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sheetmind_engine::prelude::*;` to import all essential types.

// Errors
pub use crate::{EngineError, EngineResult};

// Turn loop
pub use crate::{Engine, ExternalToolExecutor, NoExternalTools, MAX_TURN_ITERATIONS};

// Session manager & persistence bridge
pub use crate::{SessionBridge, AUTO_TITLE_MAX_CHARS, AUTO_TITLE_MIN_CHARS};

// Observation masking
pub use crate::{mask_messages, FRESH_WINDOW};

// Rules composition
pub use crate::compose_rules_block;

// Workspace manifest
pub use crate::{refresh_workspace, scan_workspace, NoopInspector, SheetInspector};
