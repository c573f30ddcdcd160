//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use sheetmind_llm::error::{LlmError, LlmResult};
use sheetmind_llm::provider::{LlmProvider, StreamBox};
use sheetmind_llm::types::{
    LlmResponse, LlmToolDefinition, Message, StopReason, StreamEvent, Usage,
};

/// Mock implementation of [`LlmProvider`] for testing the turn loop
/// without a real API call.
///
/// Uses `std::sync::Mutex` internally so it can be queued from sync
/// test setup and read from async call sites without requiring a
/// tokio runtime for the builder methods.
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    responses: Arc<Mutex<VecDeque<LlmResponse>>>,
    /// Replayed once the response queue is empty, rather than erroring.
    default_response: LlmResponse,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmProvider {
    /// Create a mock that replies with a single, tool-call-free "ok"
    /// message until responses are queued.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: text_response("ok"),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a response to return on the next call.
    #[must_use]
    pub fn with_response(self, response: LlmResponse) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.push_back(response);
        }
        self
    }

    /// Queue a plain text, tool-call-free response.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        self.with_response(text_response(text))
    }

    /// Queue a response carrying tool calls.
    #[must_use]
    pub fn with_tool_call_response(self, calls: Vec<sheetmind_llm::types::ToolCall>) -> Self {
        self.with_response(LlmResponse {
            message: Message::assistant_with_tools(calls),
            has_tool_calls: true,
            stop_reason: StopReason::ToolUse,
            usage: Usage { input_tokens: 10, output_tokens: 10 },
        })
    }

    /// Every message slice passed to `complete`/`stream`, in call order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> LlmResponse {
        self.responses
            .lock()
            .ok()
            .and_then(|mut g| g.pop_front())
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn text_response(text: impl Into<String>) -> LlmResponse {
    LlmResponse {
        message: Message::assistant(text),
        has_tool_calls: false,
        stop_reason: StopReason::EndTurn,
        usage: Usage { input_tokens: 10, output_tokens: 5 },
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        messages: &[Message],
        _tools: &[LlmToolDefinition],
        _system: &str,
    ) -> LlmResult<StreamBox> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(messages.to_vec());
        }
        let response = self.next_response();
        let text = response.message.text().unwrap_or_default().to_string();
        let events = vec![
            Ok(StreamEvent::TextDelta(text)),
            Ok(StreamEvent::Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
            Ok(StreamEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[LlmToolDefinition],
        _system: &str,
    ) -> LlmResult<LlmResponse> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(messages.to_vec());
        }
        Ok(self.next_response())
    }

    fn max_context_length(&self) -> usize {
        128_000
    }
}

/// An [`LlmProvider`] that always fails, for exercising the turn
/// loop's error path.
#[derive(Debug, Clone, Default)]
pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> &str {
        "failing-model"
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[LlmToolDefinition],
        _system: &str,
    ) -> LlmResult<StreamBox> {
        Err(LlmError::ApiRequestFailed("mock failure".to_string()))
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[LlmToolDefinition],
        _system: &str,
    ) -> LlmResult<LlmResponse> {
        Err(LlmError::ApiRequestFailed("mock failure".to_string()))
    }

    fn max_context_length(&self) -> usize {
        128_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_replays_queued_responses_in_order() {
        let provider = MockLlmProvider::new().with_text_response("first").with_text_response("second");

        let r1 = provider.complete(&[], &[], "").await.unwrap();
        let r2 = provider.complete(&[], &[], "").await.unwrap();
        let r3 = provider.complete(&[], &[], "").await.unwrap();

        assert_eq!(r1.message.text(), Some("first"));
        assert_eq!(r2.message.text(), Some("second"));
        assert_eq!(r3.message.text(), Some("ok"));
        assert_eq!(provider.recorded_calls().len(), 3);
    }

    #[tokio::test]
    async fn failing_provider_errors_on_complete() {
        let provider = FailingLlmProvider;
        assert!(provider.complete(&[], &[], "").await.is_err());
    }
}
