//! Engine-level error types.

use thiserror::Error;

/// Errors surfaced by the turn loop, session bridge, and the prompt
/// composition helpers (masking, rules, workspace manifest).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The LLM caller exhausted its fallback chain.
    #[error(transparent)]
    Llm(#[from] sheetmind_llm::LlmError),

    /// A scoped store operation failed.
    #[error(transparent)]
    Store(#[from] sheetmind_stores::StoreError),

    /// The memory layer failed.
    #[error(transparent)]
    Memory(#[from] sheetmind_memory::MemoryError),

    /// Window perception rejected or failed to apply a delta.
    #[error(transparent)]
    Window(#[from] sheetmind_window::WindowError),

    /// Scope construction failed.
    #[error(transparent)]
    Scope(#[from] sheetmind_scope::ScopeError),

    /// A built-in tool call failed.
    #[error(transparent)]
    Tool(#[from] sheetmind_tools::ToolError),

    /// A global rules file could not be read or parsed.
    #[error("rules file error: {0}")]
    Rules(String),

    /// The turn's iteration budget was exhausted without a terminal
    /// (no-tool-calls) message from the model.
    #[error("turn budget exhausted after {iterations} iterations")]
    BudgetExhausted {
        /// Iterations actually run before the budget tripped.
        iterations: u32,
    },

    /// No session id was supplied and none could be derived.
    #[error("no active session")]
    NoActiveSession,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
