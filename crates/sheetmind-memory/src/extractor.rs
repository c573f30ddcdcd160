//! Automatic memory-candidate extraction: an auxiliary LLM call that
//! reviews a conversation's user/assistant turns and proposes entries
//! worth saving, without the model explicitly calling `memory_save`.
//!
//! Disabled by default — callers opt in by running [`MemoryExtractor::extract`]
//! as a post-turn hook. Matches the conservative posture of `memory_save`
//! itself being model-invoked rather than automatic.

use std::collections::HashSet;

use sheetmind_llm::types::{Message, MessageRole};
use sheetmind_llm::LlmProvider;
use sheetmind_stores::MemoryCategory;

const SYSTEM_PROMPT: &str = "\
You are a memory-extraction assistant. Review the conversation below and extract \
information that would genuinely be useful to remember in future sessions.

Strict criteria — when in doubt, leave it out:
- Only extract information with real reuse value across sessions.
- One-off operational details, temporary values, and this task's intermediate \
steps are not worth remembering.
- If the conversation is a simple question/answer or one-off operation with \
nothing reusable, return an empty array [].
- Do not invent or stretch content to pad the list; quality matters far more \
than quantity.

Categories worth remembering:
- file_pattern: a recurring spreadsheet structure in this project (column names, \
data types, order of magnitude of row counts)
- user_pref: an explicit or repeatedly demonstrated user preference (formatting, \
style, naming, workflow)
- error_solution: a solution found after hitting a problem, with general reuse value
- general: anything else genuinely valuable for future sessions

Respond with a JSON array; each entry has `content` and `category` fields. \
Return [] if nothing is worth remembering.

Output only the JSON array, no other text.";

const MAX_MESSAGES: usize = 120;
const MAX_TOTAL_CHARS: usize = 48_000;

/// One LLM-proposed memory candidate, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMemory {
    /// The fact itself, trimmed and non-empty.
    pub content: String,
    /// Which bucket it belongs to.
    pub category: MemoryCategory,
}

/// Calls an auxiliary LLM to mine a conversation for memory candidates.
pub struct MemoryExtractor<'a> {
    llm: &'a dyn LlmProvider,
}

impl<'a> MemoryExtractor<'a> {
    /// Build an extractor around `llm`, the auxiliary model used for
    /// extraction (often a cheaper model than the main turn loop's).
    #[must_use]
    pub fn new(llm: &'a dyn LlmProvider) -> Self {
        Self { llm }
    }

    /// Extract memory candidates from `messages`. Returns an empty
    /// vec on any failure (LLM call, parse) rather than propagating an
    /// error — extraction is a best-effort background concern, never
    /// one that should fail a turn.
    pub async fn extract(&self, messages: &[Message]) -> Vec<ExtractedMemory> {
        let conversation = prepare_conversation(messages);
        if conversation.is_empty() {
            return Vec::new();
        }

        let prompt = format!("Here is the conversation history to analyze:\n\n{conversation}");
        let extraction_messages = vec![Message::user(prompt)];

        let response = match self.llm.complete(&extraction_messages, &[], SYSTEM_PROMPT).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "memory extraction LLM call failed");
                return Vec::new();
            },
        };

        let Some(text) = response.message.text() else {
            return Vec::new();
        };
        parse_extraction_response(text)
    }
}

/// Keep only user/assistant text, most recent first, capped by message
/// count and total character budget — the same two-sided cap the
/// extraction prompt itself is built from.
fn prepare_conversation(messages: &[Message]) -> String {
    let texts: Vec<(&str, &str)> = messages
        .iter()
        .rev()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .filter_map(|m| m.text().map(|t| (role_label(m.role), t)))
        .filter(|(_, t)| !t.trim().is_empty())
        .take(MAX_MESSAGES)
        .collect();

    let mut selected = Vec::new();
    let mut total_chars = 0;
    for (role, text) in texts {
        if !selected.is_empty() && total_chars + text.len() > MAX_TOTAL_CHARS {
            break;
        }
        total_chars += text.len();
        selected.push(format!("[{role}]: {text}"));
    }
    selected.reverse();
    selected.join("\n")
}

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
        MessageRole::Tool => "tool",
    }
}

fn parse_category(s: &str) -> Option<MemoryCategory> {
    match s {
        "file_pattern" => Some(MemoryCategory::FilePattern),
        "user_pref" => Some(MemoryCategory::UserPref),
        "error_solution" => Some(MemoryCategory::ErrorSolution),
        "general" => Some(MemoryCategory::General),
        _ => None,
    }
}

fn parse_extraction_response(raw: &str) -> Vec<ExtractedMemory> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Vec::new();
    }

    let Ok(items) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        tracing::warn!("memory extraction response was not valid JSON");
        return Vec::new();
    };
    let Some(items) = items.as_array() else {
        tracing::warn!("memory extraction response was not a JSON array");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for item in items {
        let Some(content) = item.get("content").and_then(serde_json::Value::as_str) else {
            continue;
        };
        let Some(category) = item.get("category").and_then(serde_json::Value::as_str).and_then(parse_category) else {
            continue;
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let dedupe_key = (category.as_str(), content.split_whitespace().collect::<Vec<_>>().join(" "));
        if !seen.insert(dedupe_key) {
            continue;
        }

        entries.push(ExtractedMemory { content: content.to_string(), category });
    }
    entries
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else { return text };
    let inner = inner.trim_start_matches("json").trim_start();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use sheetmind_llm::error::LlmResult;
    use sheetmind_llm::provider::StreamBox;
    use sheetmind_llm::types::{LlmResponse, LlmToolDefinition, StopReason, Usage};

    use super::*;

    struct StubLlm {
        reply: String,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn stream(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<StreamBox> {
            unimplemented!()
        }

        async fn complete(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<LlmResponse> {
            Ok(LlmResponse {
                message: Message::assistant(self.reply.clone()),
                has_tool_calls: false,
                stop_reason: StopReason::EndTurn,
                usage: Usage { input_tokens: 1, output_tokens: 1 },
            })
        }

        fn max_context_length(&self) -> usize {
            8192
        }
    }

    #[tokio::test]
    async fn extracts_entries_from_a_json_array_reply() {
        let llm = StubLlm {
            reply: r#"[{"content":"user likes blue charts","category":"user_pref"}]"#.to_string(),
        };
        let extractor = MemoryExtractor::new(&llm);
        let messages = vec![Message::user("I always want blue bar charts"), Message::assistant("Got it.")];
        let entries = extractor.extract(&messages).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, MemoryCategory::UserPref);
    }

    #[tokio::test]
    async fn strips_markdown_code_fence_before_parsing() {
        let llm = StubLlm { reply: "```json\n[]\n```".to_string() };
        let extractor = MemoryExtractor::new(&llm);
        let entries = extractor.extract(&[Message::user("hi"), Message::assistant("hello")]).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn skips_entries_with_unknown_category() {
        let llm = StubLlm {
            reply: r#"[{"content":"something","category":"mystery"}]"#.to_string(),
        };
        let extractor = MemoryExtractor::new(&llm);
        let entries = extractor.extract(&[Message::user("hi"), Message::assistant("hello")]).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn returns_empty_for_conversation_with_no_text() {
        let llm = StubLlm { reply: "[]".to_string() };
        let extractor = MemoryExtractor::new(&llm);
        assert!(extractor.extract(&[]).await.is_empty());
    }
}
