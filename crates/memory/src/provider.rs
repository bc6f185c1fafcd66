//! The `MemoryProvider` trait defines the interface for all memory
//! backends (REST, null, mock/test). The engine only knows the two
//! operations and their latency contract: `recall` is bounded, `remember`
//! is fire-and-forget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sg_domain::error::Result;

/// One completed turn submitted for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMemory {
    /// Stable id for the turn; duplicate submissions are dropped.
    pub turn_id: Uuid,
    pub session_id: String,
    pub user_input: String,
    pub assistant_reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TurnMemory {
    pub fn new(
        session_id: impl Into<String>,
        user_input: impl Into<String>,
        assistant_reply: impl Into<String>,
        agent: Option<String>,
    ) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            session_id: session_id.into(),
            user_input: user_input.into(),
            assistant_reply: assistant_reply.into(),
            agent,
            timestamp: Utc::now(),
        }
    }
}

/// How wide a recall searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallScope {
    /// Only memories captured in the current session.
    Session,
    /// Memories from every session (user opted in).
    CrossSession,
}

/// Brief context recalled for prompt augmentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalledContext {
    pub entries: Vec<String>,
}

impl RecalledContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render for prompt injection, one entry per line.
    pub fn brief(&self) -> String {
        self.entries.join("\n")
    }
}

/// Abstraction over the memory backend.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Retrieve context relevant to `user_input`. Callers bound this with
    /// [`crate::recall::recall_within`]; implementations should still keep
    /// their own request timeouts.
    async fn recall(
        &self,
        session_id: &str,
        user_input: &str,
        scope: RecallScope,
    ) -> Result<RecalledContext>;

    /// Persist one turn. Idempotent on duplicate `turn_id`.
    async fn remember(&self, turn: &TurnMemory) -> Result<()>;

    /// Drop all memory keys scoped to a session.
    async fn forget_session(&self, session_id: &str) -> Result<()>;

    /// Backend health probe.
    async fn health(&self) -> Result<serde_json::Value>;
}
