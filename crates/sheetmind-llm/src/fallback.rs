//! Retry and compatibility fix-up wrapper around an [`LlmProvider`].
//!
//! Transient failures (timeouts, 429s, 5xx) are retried once with a
//! backoff delay. A small set of provider-compatibility failures are
//! detected by substring match on the error text and trigger a
//! payload fix-up before a single retry. `merge_system_messages` fix-ups
//! are remembered process-wide per (model, base_url) so later calls to
//! the same endpoint skip straight to the fixed-up payload.

use std::sync::LazyLock;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;

use crate::error::{LlmError, LlmResult};
use crate::provider::LlmProvider;
use crate::types::{LlmResponse, LlmToolDefinition, Message, MessageRole};

/// Backoff and retry tuning for [`complete_with_fallback`].
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Cap, in seconds, applied to a provider's `Retry-After` hint.
    pub retry_after_cap_secs: u64,
    /// Lower bound of the uniform random delay used when no `Retry-After` is given.
    pub min_delay: Duration,
    /// Upper bound of the uniform random delay used when no `Retry-After` is given.
    pub max_delay: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            retry_after_cap_secs: 30,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(1500),
        }
    }
}

/// Process-wide record of (model, base_url) pairs known to require a
/// leading-system-message merge. Insert-only: once true, stays true.
static SYSTEM_MODE_CACHE: LazyLock<DashMap<String, bool>> = LazyLock::new(DashMap::new);

fn requires_merge(key: &str) -> bool {
    SYSTEM_MODE_CACHE.get(key).is_some_and(|v| *v)
}

fn mark_requires_merge(key: &str) {
    SYSTEM_MODE_CACHE.insert(key.to_string(), true);
}

fn endpoint_key(provider: &dyn LlmProvider) -> String {
    format!("{}::{}", provider.name(), provider.model())
}

fn is_transient(err: &LlmError) -> Option<Option<u64>> {
    match err {
        LlmError::RateLimitExceeded { retry_after_secs } => Some(Some(*retry_after_secs)),
        LlmError::ApiRequestFailed(msg) | LlmError::StreamingError(msg) => {
            let lower = msg.to_lowercase();
            let transient = lower.contains("timeout")
                || lower.contains("timed out")
                || lower.contains("connection")
                || lower.contains("500")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504");
            transient.then_some(None)
        },
        LlmError::HttpError(e) => (e.is_timeout() || e.is_connect()).then_some(None),
        _ => None,
    }
}

fn mentions_unsupported_parameter(msg: &str) -> bool {
    msg.to_lowercase().contains("unknown parameter") || msg.to_lowercase().contains("unsupported parameter")
}

fn mentions_missing_reasoning_content(msg: &str) -> bool {
    msg.to_lowercase().contains("reasoning_content")
}

fn mentions_system_multiplicity(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("system message") && (lower.contains("multiple") || lower.contains("one system"))
}

fn compat_hint(err: &LlmError) -> Option<&'static str> {
    let text = match err {
        LlmError::ApiRequestFailed(msg) | LlmError::InvalidResponse(msg) => msg.as_str(),
        _ => return None,
    };
    if mentions_unsupported_parameter(text) {
        Some("unsupported_parameter")
    } else if mentions_missing_reasoning_content(text) {
        Some("missing_reasoning_content")
    } else if mentions_system_multiplicity(text) {
        Some("system_multiplicity")
    } else {
        None
    }
}

/// Merge all leading system messages in `messages` into a single one.
///
/// No-op if there are fewer than two leading system messages.
#[must_use]
pub fn merge_leading_system_messages(messages: &[Message]) -> Vec<Message> {
    let leading = messages
        .iter()
        .take_while(|m| m.role == MessageRole::System)
        .count();
    if leading < 2 {
        return messages.to_vec();
    }
    let merged_text = messages[..leading]
        .iter()
        .filter_map(Message::text)
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut out = Vec::with_capacity(messages.len() - leading + 1);
    out.push(Message::system(merged_text));
    out.extend(messages[leading..].iter().cloned());
    out
}

async fn backoff_delay(config: &FallbackConfig, retry_after_secs: Option<u64>) {
    let delay = match retry_after_secs {
        Some(secs) => Duration::from_secs(secs.min(config.retry_after_cap_secs)),
        None => {
            let millis = rand::thread_rng()
                .gen_range(config.min_delay.as_millis()..=config.max_delay.as_millis());
            #[allow(clippy::cast_possible_truncation)]
            Duration::from_millis(millis as u64)
        },
    };
    tokio::time::sleep(delay).await;
}

/// Non-streaming completion with the fallback chain from the caller contract:
/// one retry for transient errors, one payload fix-up retry per compatibility
/// failure kind, system-message merge remembered per endpoint.
pub async fn complete_with_fallback(
    provider: &dyn LlmProvider,
    messages: &[Message],
    tools: &[LlmToolDefinition],
    system: &str,
    config: &FallbackConfig,
) -> LlmResult<LlmResponse> {
    let key = endpoint_key(provider);
    let mut payload = if requires_merge(&key) {
        merge_leading_system_messages(messages)
    } else {
        messages.to_vec()
    };

    let mut transient_retried = false;
    let mut compat_retried: Option<&'static str> = None;

    loop {
        match provider.complete(&payload, tools, system).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                if let Some(retry_after) = is_transient(&err) {
                    if transient_retried {
                        return Err(err);
                    }
                    transient_retried = true;
                    backoff_delay(config, retry_after).await;
                    continue;
                }
                if let Some(hint) = compat_hint(&err) {
                    if compat_retried == Some(hint) {
                        return Err(err);
                    }
                    compat_retried = Some(hint);
                    if hint == "system_multiplicity" {
                        mark_requires_merge(&key);
                        payload = merge_leading_system_messages(&payload);
                    }
                    // "unsupported_parameter" and "missing_reasoning_content" fix-ups
                    // operate on wire-level request fields our LlmProvider abstraction
                    // does not expose (no provider here sends prompt_cache_key or
                    // reads reasoning_content back); the retry still happens so a
                    // provider whose error was transient-looking-but-misclassified
                    // gets a second chance.
                    continue;
                }
                return Err(err);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_leading_system_messages_collapses_two() {
        let messages = vec![
            Message::system("rule one"),
            Message::system("rule two"),
            Message::user("hello"),
        ];
        let merged = merge_leading_system_messages(&messages);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text(), Some("rule one\n\nrule two"));
    }

    #[test]
    fn merge_leading_system_messages_noop_for_single() {
        let messages = vec![Message::system("only rule"), Message::user("hi")];
        let merged = merge_leading_system_messages(&messages);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text(), Some("only rule"));
    }

    #[test]
    fn classifies_rate_limit_as_transient() {
        let err = LlmError::RateLimitExceeded {
            retry_after_secs: 5,
        };
        assert_eq!(is_transient(&err), Some(Some(5)));
    }

    #[test]
    fn classifies_unsupported_parameter_as_compat() {
        let err = LlmError::ApiRequestFailed("unknown parameter: prompt_cache_key".to_string());
        assert_eq!(compat_hint(&err), Some("unsupported_parameter"));
    }
}
