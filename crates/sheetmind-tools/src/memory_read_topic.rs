//! `memory_read_topic` — return the saved facts for one memory category.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory_ctx;
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

const TOPICS: [&str; 4] = ["file_patterns", "user_prefs", "error_solutions", "general"];

/// Reads the formatted markdown for one memory topic.
pub struct MemoryReadTopicTool;

#[async_trait]
impl BuiltinTool for MemoryReadTopicTool {
    fn name(&self) -> &'static str {
        "memory_read_topic"
    }

    fn description(&self) -> &'static str {
        "Read previously saved memory for a topic (file_patterns, user_prefs, error_solutions, general)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "enum": TOPICS,
                    "description": "Which memory category to read.",
                },
            },
            "required": ["topic"],
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("topic is required".to_string()))?
            .trim();

        let Some(memory) = memory_ctx::current() else {
            return Ok("memory is disabled for this session".to_string());
        };
        if memory.read_only() {
            return Ok("memory is read-only; saved facts are unavailable for this session".to_string());
        }
        if topic.is_empty() {
            return Ok("topic must not be empty".to_string());
        }

        let filename = format!("{topic}.md");
        let text = memory
            .load_topic(&filename)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if text.is_empty() {
            Ok(format!("no saved memory for topic '{topic}'"))
        } else {
            Ok(crate::truncate_output(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_memory::{FileMemoryBackend, PersistentMemory};
    use sheetmind_stores::MemoryCategory;
    use std::sync::Arc;

    async fn with_memory<F: std::future::Future>(dir: &std::path::Path, fut: F) -> F::Output {
        let boxed: Box<dyn sheetmind_memory::MemoryStorageBackend> =
            Box::new(FileMemoryBackend::new(dir).unwrap());
        let memory: crate::memory_ctx::SharedMemory = Arc::new(PersistentMemory::new(boxed));
        memory_ctx::guard(memory, fut).await
    }

    #[tokio::test]
    async fn returns_disabled_message_without_bound_memory() {
        let tool = MemoryReadTopicTool;
        let ctx = ToolContext::new_standalone();
        let result = tool.execute(json!({"topic": "general"}), &ctx).await.unwrap();
        assert!(result.contains("disabled"));
    }

    #[tokio::test]
    async fn reads_back_saved_entry() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryReadTopicTool;
        let ctx = ToolContext::new_standalone();
        with_memory(dir.path(), async {
            memory_ctx::current()
                .unwrap()
                .save(MemoryCategory::General, "likes concise answers", "tool")
                .await
                .unwrap();
            let result = tool.execute(json!({"topic": "general"}), &ctx).await.unwrap();
            assert!(result.contains("likes concise answers"));
        })
        .await;
    }

    #[tokio::test]
    async fn rejects_missing_topic() {
        let tool = MemoryReadTopicTool;
        let ctx = ToolContext::new_standalone();
        assert!(tool.execute(json!({}), &ctx).await.is_err());
    }
}
