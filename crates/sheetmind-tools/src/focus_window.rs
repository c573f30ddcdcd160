//! `focus_window` — restore, scroll, expand, or clear the filter on an
//! open window without a fresh spreadsheet read.

use async_trait::async_trait;
use serde_json::{json, Value};
use sheetmind_window::WindowError;

use crate::{BuiltinTool, ToolContext, ToolError, ToolResult};

/// Dispatches a `focus_window` call to the session's window manager.
pub struct FocusWindowTool;

#[async_trait]
impl BuiltinTool for FocusWindowTool {
    fn name(&self) -> &'static str {
        "focus_window"
    }

    fn description(&self) -> &'static str {
        "Restore, scroll, expand, or clear the filter on a window that is already open, without re-reading the file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "window_id": {"type": "string"},
                "action": {"type": "string", "enum": ["restore", "clear_filter", "scroll", "expand"]},
                "range": {"type": "string", "description": "A1-style range, e.g. \"A1:D25\". Used by scroll."},
                "rows": {"type": "integer", "description": "Visible row count. Used by expand."},
            },
            "required": ["window_id", "action"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let window_id = args
            .get("window_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("window_id is required".to_string()))?;
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("action is required".to_string()))?;
        let range = args.get("range").and_then(Value::as_str);
        let rows = args.get("rows").and_then(Value::as_i64);

        let mut manager = ctx.window().lock().await;
        match manager.focus_window_action(window_id, action, range, rows) {
            Ok(outcome) => {
                let body = json!({
                    "ok": outcome.ok,
                    "message": outcome.message,
                    "window_id": outcome.window_id,
                    "needs_refill": outcome.needs_refill,
                    "refill_range": outcome.refill_range,
                });
                Ok(body.to_string())
            },
            Err(WindowError::UnknownWindow(id)) => {
                let available: Vec<&str> = manager.window_ids().collect();
                let body = json!({
                    "ok": false,
                    "error": format!("no window with id '{id}' is open"),
                    "available_windows": available,
                });
                Ok(body.to_string())
            },
            Err(WindowError::InvalidFocusAction(action)) => Err(ToolError::InvalidArguments(format!(
                "unknown focus action '{action}'"
            ))),
            Err(other) => Err(ToolError::ExecutionFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_window_reports_available_windows_hint() {
        let tool = FocusWindowTool;
        let ctx = ToolContext::new_standalone();
        {
            let mut manager = ctx.window().lock().await;
            let arguments = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:A2"});
            let result = json!({"rows": [{"a": 1}, {"a": 2}]});
            manager.observe_tool_call("read_excel", &arguments, Some(&result), true, "");
        }
        let result = tool
            .execute(json!({"window_id": "sheet_9", "action": "restore"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("available_windows"));
    }

    #[tokio::test]
    async fn rejects_unknown_action() {
        let tool = FocusWindowTool;
        let ctx = ToolContext::new_standalone();
        let result = tool
            .execute(json!({"window_id": "sheet_1", "action": "teleport"}), &ctx)
            .await;
        assert!(result.is_err());
    }
}
