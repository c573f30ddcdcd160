//! `memory_save` — persist one fact under a memory category.

use async_trait::async_trait;
use serde_json::{json, Value};
use sheetmind_stores::MemoryCategory;

use crate::memory_ctx;
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

const CATEGORIES: [&str; 4] = ["file_patterns", "user_prefs", "error_solutions", "general"];

fn parse_category(name: &str) -> MemoryCategory {
    match name {
        "file_patterns" => MemoryCategory::FilePattern,
        "user_prefs" => MemoryCategory::UserPref,
        "error_solutions" => MemoryCategory::ErrorSolution,
        _ => MemoryCategory::General,
    }
}

/// Saves a fact for later recall by `memory_read_topic`.
pub struct MemorySaveTool;

#[async_trait]
impl BuiltinTool for MemorySaveTool {
    fn name(&self) -> &'static str {
        "memory_save"
    }

    fn description(&self) -> &'static str {
        "Save a fact worth remembering across sessions (a file pattern, a user preference, an error and its fix, or anything else)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The fact to remember, in a few plain sentences.",
                },
                "category": {
                    "type": "string",
                    "enum": CATEGORIES,
                },
            },
            "required": ["content", "category"],
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("content is required".to_string()))?;
        let category_name = args
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("category is required".to_string()))?;

        if content.trim().is_empty() {
            return Ok("content must not be empty; nothing was saved".to_string());
        }

        let Some(memory) = memory_ctx::current() else {
            return Ok("memory is disabled for this session; nothing was saved".to_string());
        };
        if memory.read_only() {
            return Ok("memory is read-only for this session; nothing was saved".to_string());
        }

        let category = parse_category(category_name);
        memory
            .save(category, content, "memory_save")
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(format!("saved to {category_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_memory::{FileMemoryBackend, PersistentMemory};
    use std::sync::Arc;

    fn memory_handle(dir: &std::path::Path) -> memory_ctx::SharedMemory {
        let boxed: Box<dyn sheetmind_memory::MemoryStorageBackend> =
            Box::new(FileMemoryBackend::new(dir).unwrap());
        Arc::new(PersistentMemory::new(boxed))
    }

    #[tokio::test]
    async fn rejects_blank_content() {
        let tool = MemorySaveTool;
        let ctx = ToolContext::new_standalone();
        let result = tool
            .execute(json!({"content": "   ", "category": "general"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("nothing was saved"));
    }

    #[tokio::test]
    async fn saves_then_readable_via_memory_handle() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemorySaveTool;
        let ctx = ToolContext::new_standalone();
        memory_ctx::guard(memory_handle(dir.path()), async {
            let result = tool
                .execute(json!({"content": "prefers dark mode", "category": "user_prefs"}), &ctx)
                .await
                .unwrap();
            assert_eq!(result, "saved to user_prefs");
            let entries = memory_ctx::current().unwrap().list_entries(None).await.unwrap();
            assert_eq!(entries.len(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn unbound_memory_reports_disabled() {
        let tool = MemorySaveTool;
        let ctx = ToolContext::new_standalone();
        let result = tool
            .execute(json!({"content": "hello", "category": "general"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("disabled"));
    }
}
