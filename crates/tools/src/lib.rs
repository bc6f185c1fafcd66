//! `sg-tools` — the tool contract and invocation context.
//!
//! Tools are side-effectful operations invoked by agents. They receive
//! their parameters and a [`ToolContext`] bound to the current stream,
//! session, and cancel token, and report progress through the context's
//! emitters. Tool authors must not retain the context past `execute`.

pub mod context;

pub use context::ToolContext;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Outcome of one tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The contract every tool satisfies.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the tool. Intermediate events go through the context; the
    /// returned outcome is what the agent sees.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolOutcome;
}

/// Run a tool under the per-tool timeout, then settle the context: orphaned
/// tool ids get synthesized terminals, and timeout expiry surfaces as
/// cancellation.
pub async fn invoke(
    tool: &dyn Tool,
    params: Value,
    ctx: &ToolContext,
    timeout: Duration,
) -> ToolOutcome {
    if ctx.cancel_token().is_cancelled() {
        ctx.cancel_inflight().await;
        return ToolOutcome::failed("cancelled");
    }

    match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
        Ok(outcome) => {
            ctx.finish().await;
            outcome
        }
        Err(_) => {
            // The execute future is dropped on expiry; in-flight ids get
            // their cancelled terminals synthesized here.
            tracing::warn!(
                tool = tool.name(),
                timeout_ms = timeout.as_millis() as u64,
                "tool execution timed out"
            );
            ctx.cancel_inflight().await;
            ToolOutcome::failed("cancelled")
        }
    }
}
