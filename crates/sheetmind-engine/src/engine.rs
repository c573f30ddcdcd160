//! The agent turn loop: append the user message, call the LLM, dispatch
//! tool calls, enrich their results through window perception, and
//! persist as the turn progresses.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sheetmind_llm::fallback::{complete_with_fallback, FallbackConfig};
use sheetmind_llm::types::{LlmResponse, Message as LlmMessage, ToolCall, ToolCallResult};
use sheetmind_llm::LlmProvider;
use sheetmind_stores::{AuditLogStore, LlmCallLogEntry, ToolCallLogEntry};
use sheetmind_tools::memory_ctx::{self, SharedMemory};
use sheetmind_tools::{BuiltinTool as _, ToolContext, ToolRegistry};
use sheetmind_window::WindowPerceptionManager;
use tokio::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::session::SessionBridge;

/// Iteration budget for a single turn: the number of LLM round-trips
/// (each potentially followed by a batch of tool calls) before the
/// turn aborts rather than looping forever.
pub const MAX_TURN_ITERATIONS: u32 = 25;

/// Executes tool calls the built-in registry doesn't own: the
/// black-box spreadsheet operations (`read_excel`, `write_excel`,
/// `list_directory`, `inspect_excel_files`, …) that live outside this
/// crate and are treated as opaque JSON-in, JSON-out tools.
#[async_trait]
pub trait ExternalToolExecutor: Send + Sync {
    /// Execute `name` with `arguments`. `Err` carries a message surfaced
    /// to the model as a tool-error result, not an aborted turn.
    async fn execute(&self, name: &str, arguments: &Value) -> Result<String, String>;
}

/// An [`ExternalToolExecutor`] that refuses every call. Useful as a
/// placeholder until a real tool backend is wired in.
pub struct NoExternalTools;

#[async_trait]
impl ExternalToolExecutor for NoExternalTools {
    async fn execute(&self, name: &str, _arguments: &Value) -> Result<String, String> {
        Err(format!("no external tool executor configured for '{name}'"))
    }
}

/// Drives one session's turn loop: the LLM caller, the built-in and
/// external tool surfaces, window perception, and the persistence
/// bridge all meet here.
pub struct Engine<'a> {
    llm: Box<dyn LlmProvider>,
    fallback_config: FallbackConfig,
    tools: ToolRegistry,
    external_tools: Box<dyn ExternalToolExecutor>,
    tool_context: ToolContext,
    memory: SharedMemory,
    session: SessionBridge<'a>,
    /// Auxiliary model for post-turn memory extraction. `None` (the
    /// default) disables the hook entirely — extraction stays an
    /// opt-in, since `memory_save` being model-invoked is already the
    /// conservative default.
    extraction_llm: Option<Box<dyn LlmProvider>>,
}

impl<'a> Engine<'a> {
    /// Build an engine around an already-started session bridge, with
    /// the post-turn memory-extraction hook disabled.
    #[must_use]
    pub fn new(
        llm: Box<dyn LlmProvider>,
        tools: ToolRegistry,
        external_tools: Box<dyn ExternalToolExecutor>,
        window: Arc<Mutex<WindowPerceptionManager>>,
        memory: SharedMemory,
        session: SessionBridge<'a>,
    ) -> Self {
        let tool_context = ToolContext::new(window);
        Self {
            llm,
            fallback_config: FallbackConfig::default(),
            tools,
            external_tools,
            tool_context,
            memory,
            session,
            extraction_llm: None,
        }
    }

    /// Enable the post-turn memory-extraction hook, using `llm` as the
    /// auxiliary extraction model.
    #[must_use]
    pub fn with_memory_extraction(mut self, llm: Box<dyn LlmProvider>) -> Self {
        self.extraction_llm = Some(llm);
        self
    }

    /// The session bridge, for inspecting persisted state between turns.
    #[must_use]
    pub fn session(&self) -> &SessionBridge<'a> {
        &self.session
    }

    /// The session bridge, mutably.
    pub fn session_mut(&mut self) -> &mut SessionBridge<'a> {
        &mut self.session
    }

    /// Run one full agent turn for `user_input`. Terminates when the
    /// model returns a message with no tool calls, or when
    /// [`MAX_TURN_ITERATIONS`] is exhausted. Checkpoints and flushes the
    /// session on a terminal message.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BudgetExhausted`] if the loop doesn't
    /// terminate in time. LLM errors exhausting
    /// [`complete_with_fallback`]'s retries, and persistence errors,
    /// propagate; tool failures do not (they become an error-flagged
    /// tool-result message and the loop continues).
    pub async fn run_turn(&mut self, system_prompt: &str, user_input: &str) -> EngineResult<String> {
        let memory = self.memory.clone();
        memory_ctx::guard(memory, self.run_turn_inner(system_prompt, user_input)).await
    }

    async fn run_turn_inner(&mut self, system_prompt: &str, user_input: &str) -> EngineResult<String> {
        self.session.session_turn = self.session.session_turn.saturating_add(1);
        self.session.push(LlmMessage::user(user_input));

        let tool_defs = self.tools.all_definitions();
        let audit = AuditLogStore::new(self.session.db(), self.session.user_id().cloned());

        for iteration in 0..MAX_TURN_ITERATIONS {
            let iteration = i64::from(iteration);
            let masked = self.session.masked_messages();

            let started = std::time::Instant::now();
            let outcome = complete_with_fallback(self.llm.as_ref(), &masked, &tool_defs, system_prompt, &self.fallback_config).await;
            let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

            let response = self.record_llm_call(&audit, iteration, latency_ms, outcome).await?;

            if !response.has_tool_calls {
                let text = response.message.text().unwrap_or_default().to_string();
                self.session.push(response.message);
                self.session
                    .checkpoint(&serde_json::json!({"turn": self.session.session_turn}), &serde_json::json!([]))
                    .await?;
                self.session.flush().await?;
                self.run_memory_extraction().await;
                return Ok(text);
            }

            let tool_calls: Vec<ToolCall> = response.message.tool_calls().unwrap_or_default().to_vec();
            self.session.push(response.message);

            for call in &tool_calls {
                let result = self.dispatch_and_enrich(&call).await;
                self.record_tool_call(&audit, iteration, &call.name, !result.is_error).await;
                self.session.push(LlmMessage::tool_result(result));
            }

            self.session.flush().await?;
        }

        Err(EngineError::BudgetExhausted { iterations: MAX_TURN_ITERATIONS })
    }

    async fn record_llm_call(
        &self,
        audit: &AuditLogStore<'_>,
        iteration: i64,
        latency_ms: i64,
        outcome: sheetmind_llm::LlmResult<LlmResponse>,
    ) -> EngineResult<LlmResponse> {
        let success = outcome.is_ok();
        let entry = LlmCallLogEntry {
            session_id: self.session.session().id.clone(),
            turn: self.session.session_turn,
            iteration,
            model_name: self.llm.model().to_string(),
            prompt_tokens: outcome.as_ref().ok().map(|r| i64::try_from(r.usage.input_tokens).unwrap_or(i64::MAX)),
            completion_tokens: outcome.as_ref().ok().map(|r| i64::try_from(r.usage.output_tokens).unwrap_or(i64::MAX)),
            latency_ms: Some(latency_ms),
            ttft_ms: None,
            success,
        };
        // Persistence failures for the audit log are logged but never
        // abort the turn: the user-visible reply must not be lost over a
        // missed audit row.
        if let Err(e) = audit.log_llm_call(&entry).await {
            tracing::warn!(error = %e, "failed to write llm_call_log row");
        }
        outcome.map_err(EngineError::from)
    }

    /// Mine the turn's message log for memory candidates and save them,
    /// if the extraction hook is enabled. Failures are logged, never
    /// propagated — extraction is a best-effort background concern.
    async fn run_memory_extraction(&self) {
        let Some(extraction_llm) = &self.extraction_llm else { return };
        let entries = sheetmind_memory::MemoryExtractor::new(extraction_llm.as_ref()).extract(&self.session.raw_messages).await;
        for entry in entries {
            if let Err(e) = self.memory.save(entry.category, &entry.content, "memory_extractor").await {
                tracing::warn!(error = %e, "failed to save extracted memory entry");
            }
        }
    }

    async fn record_tool_call(&self, audit: &AuditLogStore<'_>, iteration: i64, tool_name: &str, success: bool) {
        let entry = ToolCallLogEntry {
            session_id: self.session.session().id.clone(),
            turn: self.session.session_turn,
            iteration,
            tool_name: tool_name.to_string(),
            success,
            latency_ms: None,
        };
        if let Err(e) = audit.log_tool_call(&entry).await {
            tracing::warn!(error = %e, "failed to write tool_call_log row");
        }
    }

    /// Execute one tool call (built-in or external) and fold its
    /// result through window-perception enrichment before it becomes a
    /// tool-result message.
    async fn dispatch_and_enrich(&self, call: &ToolCall) -> ToolCallResult {
        let (content, is_error) = self.execute_tool_call(call).await;

        let result_json = serde_json::from_str::<Value>(&content).ok();
        let observation = {
            let mut window = self.tool_context.window().lock().await;
            window.observe_tool_call(&call.name, &call.arguments, result_json.as_ref(), !is_error, "")
        };

        let enriched = match observation {
            Some(obs) if !obs.tool_perception_block.is_empty() => {
                format!("{content}\n\n{}", obs.tool_perception_block)
            },
            _ => content,
        };

        if is_error {
            ToolCallResult::error(call.id.clone(), enriched)
        } else {
            ToolCallResult::success(call.id.clone(), enriched)
        }
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> (String, bool) {
        // `ToolRegistry::is_builtin` only tests for the MCP "server:tool"
        // colon convention, which also matches black-box tool names like
        // `read_excel` — so routing is decided by actual registration,
        // not by that naming check.
        if let Some(tool) = self.tools.get(&call.name) {
            return match tool.execute(call.arguments.clone(), &self.tool_context).await {
                Ok(output) => (sheetmind_tools::truncate_output(output), false),
                Err(e) => (e.to_string(), true),
            };
        }
        match self.external_tools.execute(&call.name, &call.arguments).await {
            Ok(output) => (sheetmind_tools::truncate_output(output), false),
            Err(e) => (e, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sheetmind_db::migrate;
    use sheetmind_db::Database;
    use sheetmind_llm::types::{LlmToolDefinition, Message, StopReason, Usage};
    use sheetmind_llm::provider::StreamBox;
    use sheetmind_llm::LlmResult;
    use sheetmind_memory::{FileMemoryBackend, PersistentMemory};
    use sheetmind_window::ManagerConfig;
    use tokio::sync::Mutex;

    use super::*;
    use crate::session::SessionBridge;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn stream(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<StreamBox> {
            unimplemented!("turn loop tests exercise complete(), not stream()")
        }

        async fn complete(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<LlmResponse> {
            Ok(LlmResponse {
                message: Message::assistant("done"),
                has_tool_calls: false,
                stop_reason: StopReason::EndTurn,
                usage: Usage { input_tokens: 10, output_tokens: 5 },
            })
        }

        fn max_context_length(&self) -> usize {
            8192
        }
    }

    async fn test_memory() -> SharedMemory {
        let dir = tempfile::tempdir().unwrap();
        let boxed: Box<dyn sheetmind_memory::MemoryStorageBackend> = Box::new(FileMemoryBackend::new(dir.path()).unwrap());
        Arc::new(PersistentMemory::new(boxed))
    }

    #[tokio::test]
    async fn run_turn_terminates_on_tool_call_free_reply() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let session = SessionBridge::start(&db, None, None).await.unwrap();
        let window = Arc::new(Mutex::new(WindowPerceptionManager::new(ManagerConfig::default())));
        let mut engine = Engine::new(
            Box::new(StubProvider),
            ToolRegistry::with_defaults(),
            Box::new(NoExternalTools),
            window,
            test_memory().await,
            session,
        );

        let reply = engine.run_turn("you are a helpful agent", "hello").await.unwrap();
        assert_eq!(reply, "done");
        assert_eq!(engine.session().raw_messages.len(), 2);
    }
}
