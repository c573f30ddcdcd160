//! Per-request correlation context: a stable id plus a tracing span
//! that every log line emitted while handling the request should nest
//! under.

use tracing::Span;

/// Correlates every log line produced while handling one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    component: String,
    operation: Option<String>,
}

impl RequestContext {
    /// Start a context for `component`, generating a fresh request id.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            component: component.into(),
            operation: None,
        }
    }

    /// Attach an operation name (e.g. `"run_turn"`, `"ingest_tool_result"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// The generated request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Build (but do not enter) the tracing span for this context.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("")
        )
    }

    /// Enter the span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard { _entered: self.span().entered() }
    }
}

/// Holds a [`RequestContext`]'s span entered; exits it on drop.
pub struct RequestGuard {
    _entered: tracing::span::EnteredSpan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestContext::new("engine");
        let b = RequestContext::new("engine");
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn with_operation_is_chainable() {
        let ctx = RequestContext::new("engine").with_operation("run_turn");
        let _guard = ctx.enter();
        tracing::info!("inside span");
    }
}
