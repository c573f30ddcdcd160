#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! The three tools the model calls explicitly during an agent turn:
//! `memory_read_topic`, `memory_save`, and `focus_window`. Every other
//! capability (reading/writing spreadsheets, listing directories) is
//! exposed to the model as ordinary tool results produced by the
//! window-perception pipeline, not as a `BuiltinTool`.

mod focus_window;
mod memory_read_topic;
mod memory_save;

pub mod memory_ctx;

pub use focus_window::FocusWindowTool;
pub use memory_ctx::SharedMemory;
pub use memory_read_topic::MemoryReadTopicTool;
pub use memory_save::MemorySaveTool;

use sheetmind_llm::LlmToolDefinition;
use sheetmind_window::WindowPerceptionManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maximum output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// A built-in tool that executes directly in-process.
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Tool name (no colons — distinguishes from MCP "server:tool" format).
    fn name(&self) -> &'static str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Shared context available to all built-in tools.
///
/// `memory_read_topic`/`memory_save` resolve their `PersistentMemory`
/// handle from the [`memory_ctx`] task-local rather than from a field
/// here, so a handle is never accidentally shared across sessions.
/// `focus_window` needs its session's window manager directly, since
/// a manager is never shared across sessions either way.
pub struct ToolContext {
    window: Arc<Mutex<WindowPerceptionManager>>,
}

impl ToolContext {
    /// Build a context around an existing (per-session) window manager.
    #[must_use]
    pub fn new(window: Arc<Mutex<WindowPerceptionManager>>) -> Self {
        Self { window }
    }

    /// Build a context with a fresh, default-configured window manager.
    /// Mainly useful for tests and standalone tool invocation.
    #[must_use]
    pub fn new_standalone() -> Self {
        Self::new(Arc::new(Mutex::new(WindowPerceptionManager::new(
            sheetmind_window::ManagerConfig::default(),
        ))))
    }

    /// The session's window-perception manager.
    #[must_use]
    pub fn window(&self) -> &Arc<Mutex<WindowPerceptionManager>> {
        &self.window
    }
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result type for tool execution.
pub type ToolResult = Result<String, ToolError>;

/// Registry of built-in tools for lookup and LLM definition export.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with all default tools registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MemoryReadTopicTool));
        registry.register(Box::new(MemorySaveTool));
        registry.register(Box::new(FocusWindowTool));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Check if a name refers to a built-in tool (no colon = built-in).
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        !name.contains(':')
    }

    /// Export all tool definitions for the LLM.
    #[must_use]
    pub fn all_definitions(&self) -> Vec<LlmToolDefinition> {
        self.tools
            .values()
            .map(|t| {
                LlmToolDefinition::new(t.name())
                    .with_description(t.description())
                    .with_schema(t.input_schema())
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate output to stay within LLM context limits.
///
/// If `output` exceeds [`MAX_OUTPUT_CHARS`], it is truncated and a notice is appended.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut truncated = output[..MAX_OUTPUT_CHARS].to_string();
    truncated.push_str("\n\n... (output truncated — exceeded 30000 character limit)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(ToolRegistry::is_builtin("memory_save"));
        assert!(!ToolRegistry::is_builtin("filesystem:read_file"));
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.get("memory_read_topic").is_some());
        assert!(registry.get("memory_save").is_some());
        assert!(registry.get("focus_window").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_all_definitions() {
        let registry = ToolRegistry::with_defaults();
        let defs = registry.all_definitions();
        assert_eq!(defs.len(), 3);
        for def in &defs {
            assert!(!def.name.contains(':'));
            assert!(def.description.is_some());
        }
    }

    #[test]
    fn test_truncate_output_small() {
        let small = "hello".to_string();
        assert_eq!(truncate_output(small.clone()), small);
    }

    #[test]
    fn test_truncate_output_large() {
        let large = "x".repeat(40_000);
        let result = truncate_output(large);
        assert!(result.len() < 40_000);
        assert!(result.contains("output truncated"));
    }
}
