//! Test fixtures for common types.

use sheetmind_core::{SessionId, UserId};
use sheetmind_llm::types::{Message, ToolCall, ToolCallResult};
use uuid::Uuid;

/// Create a test session id.
#[must_use]
pub fn test_session_id() -> SessionId {
    SessionId::new()
}

/// Create a test session id from a specific UUID, for deterministic
/// fixtures that need to compare ids across calls.
#[must_use]
pub fn test_session_id_from(uuid: Uuid) -> SessionId {
    SessionId::from_existing(uuid.to_string())
}

/// Create a test authenticated user id.
#[must_use]
pub fn test_user_id() -> UserId {
    UserId::Authenticated(Uuid::new_v4().to_string())
}

/// The anonymous sentinel user id.
#[must_use]
pub fn test_anonymous_user_id() -> UserId {
    UserId::Anonymous
}

/// A short conversation: one user turn, one tool call, one tool
/// result, one assistant reply. Useful for masking and session-bridge
/// tests that need a realistic-shaped message log.
#[must_use]
pub fn test_conversation() -> Vec<Message> {
    vec![
        Message::user("read the first sheet of budget.xlsx"),
        Message::assistant_with_tools(vec![ToolCall::new("call-1", "read_excel").with_arguments(serde_json::json!({
            "file": "budget.xlsx",
            "sheet": "Sheet1",
        }))]),
        Message::tool_result(ToolCallResult::success(
            "call-1",
            serde_json::json!({
                "file": "budget.xlsx",
                "sheet": "Sheet1",
                "rows": 42,
                "cols": 6,
                "headers": ["date", "category", "amount"],
            })
            .to_string(),
        )),
        Message::assistant("Sheet1 has 42 rows across 6 columns."),
    ]
}

/// A tool call fixture for `tool_name`, with arbitrary JSON arguments.
#[must_use]
pub fn test_tool_call(call_id: &str, tool_name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall::new(call_id, tool_name).with_arguments(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_fixture_is_unique_per_call() {
        let a = test_session_id();
        let b = test_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_from_uuid_is_deterministic() {
        let uuid = Uuid::new_v4();
        assert_eq!(test_session_id_from(uuid), test_session_id_from(uuid));
    }

    #[test]
    fn anonymous_user_fixture_has_no_db_id() {
        assert!(test_anonymous_user_id().is_anonymous());
        assert!(!test_user_id().is_anonymous());
    }

    #[test]
    fn conversation_fixture_has_expected_shape() {
        let messages = test_conversation();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].text(), Some("read the first sheet of budget.xlsx"));
    }
}
