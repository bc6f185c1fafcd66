//! Per-session message records.
//!
//! Messages are created by the orchestrator (user/assistant turns) or by
//! tool contexts (tool output), appended to a session's log exactly once,
//! and never mutated afterwards. The `seq` is assigned by the store at
//! append time and is monotonic per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::routing::RoutingMetadata;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    Tool,
}

/// Slash-command provenance attached to a user turn. The command catalog
/// itself is resolved upstream; only the resolved routing survives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashCommandRecord {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

/// Structured message metadata. Unknown keys survive a round-trip through
/// the flattened `extra` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slash_command: Option<SlashCommandRecord>,
    /// Tool execution this message belongs to (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_execution: Option<Uuid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.slash_command.is_none() && self.tool_execution.is_none() && self.extra.is_empty()
    }

    /// Metadata for a user turn carrying resolved routing.
    pub fn from_routing(routing: &RoutingMetadata) -> Self {
        let mut meta = Self::default();
        if let Some(command) = &routing.command_name {
            meta.slash_command = Some(SlashCommandRecord {
                command: command.clone(),
                agent_type: routing.agent_type.clone(),
            });
        }
        meta
    }
}

/// A single message in a session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic per-session sequence, assigned on append (0 = unassigned).
    #[serde(default)]
    pub seq: u64,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "MessageMetadata::is_empty")]
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            seq: 0,
            kind: MessageKind::User,
            content: content.into(),
            timestamp: Utc::now(),
            agent: None,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn assistant(content: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            seq: 0,
            kind: MessageKind::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            agent: Some(agent.into()),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn tool(content: impl Into<String>, agent: impl Into<String>, tool_id: Uuid) -> Self {
        Self {
            seq: 0,
            kind: MessageKind::Tool,
            content: content.into(),
            timestamp: Utc::now(),
            agent: Some(agent.into()),
            metadata: MessageMetadata {
                tool_execution: Some(tool_id),
                ..MessageMetadata::default()
            },
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One page of a session's message log.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub total: u64,
}
