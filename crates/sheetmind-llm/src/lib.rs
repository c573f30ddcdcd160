//! LLM provider abstraction: streaming message generation, tool-call
//! assembly, and a small set of concrete providers.
//!
//! [`LlmProvider`] is the seam the engine loop depends on. Providers
//! stream [`StreamEvent`]s; the caller assembles tool calls from the
//! `ToolCallStart`/`ToolCallDelta`/`ToolCallEnd` triple the same way
//! regardless of which provider produced them.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod claude;
pub mod error;
pub mod fallback;
pub mod openai_compat;
pub mod prelude;
pub mod provider;
pub mod types;

pub use claude::ClaudeProvider;
pub use error::{LlmError, LlmResult};
pub use fallback::{complete_with_fallback, merge_leading_system_messages, FallbackConfig};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderConfig, StreamBox};
pub use types::{
    ContentPart, LlmResponse, LlmToolDefinition, Message, MessageContent, MessageRole, StopReason,
    StreamEvent, ToolCall, ToolCallResult, Usage,
};
