//! Shared domain types for the ChatSG orchestration engine.
//!
//! Everything the crates agree on lives here: the response-stream event
//! protocol, message and session records, capability descriptors, routing
//! types, tool execution records, cancellation, configuration, and the
//! common error type.

pub mod cancel;
pub mod capability;
pub mod config;
pub mod error;
pub mod message;
pub mod routing;
pub mod session;
pub mod stream;
pub mod tool;
pub mod trace;

pub use cancel::CancelToken;
pub use capability::{AgentCapabilities, AgentInfo, AgentKind};
pub use error::{Error, Result};
pub use message::{Message, MessageKind, MessageMetadata, MessagePage, SlashCommandRecord};
pub use routing::{AgentSelection, RoutingMetadata};
pub use session::{
    AgentHistoryEntry, HandoffRecord, PreferencesPatch, SessionMeta, UserPreferences,
};
pub use stream::{BoxStream, OrchestrationSummary, StreamEvent, StreamWriter};
pub use tool::{ToolExecutionRecord, ToolStatus};
pub use trace::TraceEvent;
