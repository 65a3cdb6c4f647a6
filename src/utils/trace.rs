use std::future::Future;

/// Per-request (or per-job) context visible to logging and error rendering.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub path: Option<String>,
    /// Whether internal error messages may be returned to the client.
    pub expose_errors: bool,
}

tokio::task_local! {
    static TRACE_CONTEXT: TraceContext;
}

/// Runs `fut` with `context` as the current trace context.
pub async fn scope<F: Future>(context: TraceContext, fut: F) -> F::Output {
    TRACE_CONTEXT.scope(context, fut).await
}

pub fn current() -> Option<TraceContext> {
    TRACE_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

pub fn current_trace_id() -> Option<String> {
    TRACE_CONTEXT.try_with(|ctx| ctx.trace_id.clone()).ok()
}

pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trace_id_only_visible_inside_scope() {
        assert!(current_trace_id().is_none());

        let ctx = TraceContext {
            trace_id: "abc-123".to_string(),
            path: Some("/health".to_string()),
            expose_errors: false,
        };
        let seen = scope(ctx, async { current_trace_id() }).await;

        assert_eq!(seen.as_deref(), Some("abc-123"));
        assert!(current_trace_id().is_none());
    }
}
