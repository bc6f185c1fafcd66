//! The null backend: recalls nothing, remembers nothing.
//!
//! Default when no memory service is configured; also useful in tests.

use async_trait::async_trait;

use sg_domain::error::Result;

use crate::provider::{MemoryProvider, RecallScope, RecalledContext, TurnMemory};

#[derive(Debug, Default)]
pub struct NullMemory;

#[async_trait]
impl MemoryProvider for NullMemory {
    async fn recall(
        &self,
        _session_id: &str,
        _user_input: &str,
        _scope: RecallScope,
    ) -> Result<RecalledContext> {
        Ok(RecalledContext::empty())
    }

    async fn remember(&self, turn: &TurnMemory) -> Result<()> {
        tracing::debug!(
            session_id = %turn.session_id,
            turn_id = %turn.turn_id,
            "null memory: dropping remember submission"
        );
        Ok(())
    }

    async fn forget_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn health(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "backend": "null", "ok": true }))
    }
}
