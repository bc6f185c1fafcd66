//! The response-stream event protocol.
//!
//! One request produces one finite, single-producer sequence of tagged
//! events: `connected`, then `start`, then any number of token/status/tool
//! events, closed by exactly one terminal (`done` or `error`). The writer
//! side of a stream is always a single producer; concurrent emitters
//! (agents spawning tools) serialize through one sink.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// A boxed async stream, used for LLM token streaming.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted on a response stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// The response channel is established.
    #[serde(rename = "connected")]
    Connected,

    /// Agent execution is starting.
    #[serde(rename = "start")]
    Start {
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },

    /// A text token chunk. Never empty.
    #[serde(rename = "token")]
    Token { content: String },

    /// Out-of-band status notice (e.g. "falling back to TechnicalAgent").
    #[serde(rename = "status")]
    Status {
        status: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    /// A tool invocation has started.
    #[serde(rename = "tool_start")]
    ToolStart {
        tool_id: Uuid,
        tool_name: String,
        agent_name: String,
        parameters: Value,
    },

    /// Incremental tool progress.
    #[serde(rename = "tool_progress")]
    ToolProgress {
        tool_id: Uuid,
        progress: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    /// Tool finished successfully. Terminal for its `tool_id`.
    #[serde(rename = "tool_result")]
    ToolResult { tool_id: Uuid, result: Value },

    /// Tool failed. Terminal for its `tool_id`.
    #[serde(rename = "tool_error")]
    ToolError { tool_id: Uuid, error: String },

    /// The request completed. Terminal for the stream.
    #[serde(rename = "done")]
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        summary: OrchestrationSummary,
    },

    /// The request failed. Terminal for the stream.
    #[serde(rename = "error")]
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// The tool id this event belongs to, when it is a tool event.
    pub fn tool_id(&self) -> Option<Uuid> {
        match self {
            StreamEvent::ToolStart { tool_id, .. }
            | StreamEvent::ToolProgress { tool_id, .. }
            | StreamEvent::ToolResult { tool_id, .. }
            | StreamEvent::ToolError { tool_id, .. } => Some(*tool_id),
            _ => None,
        }
    }

    /// Whether this event is terminal for its `tool_id`.
    pub fn is_tool_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::ToolResult { .. } | StreamEvent::ToolError { .. }
        )
    }
}

/// How the orchestrator arrived at the reply, attached to `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSummary {
    pub confidence: f32,
    pub reason: String,
    pub execution_time_ms: u64,
    pub agent_lock_used: bool,
    pub forced_by_command: bool,
}

/// The transport seam: something that carries events to the consumer.
///
/// The transport layer (SSE, WebSocket, in-process channel) implements this;
/// the engine and tool contexts only ever see the trait. `write` may await
/// on the consumer's flow control.
#[async_trait::async_trait]
pub trait StreamWriter: Send + Sync {
    async fn write(&self, event: StreamEvent) -> Result<()>;

    /// Close the channel. Idempotent.
    async fn close(&self);
}
