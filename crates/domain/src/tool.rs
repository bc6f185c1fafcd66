//! Tool execution records persisted to the per-session tool log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Starting,
    Running,
    Completed,
    Failed,
}

impl ToolStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Failed)
    }
}

/// A snapshot of one tool invocation, appended to the tool log on every
/// status transition. The latest record per `tool_id` is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    /// Monotonic per-session sequence in the tool log (assigned on append).
    #[serde(default)]
    pub seq: u64,
    pub tool_id: Uuid,
    pub tool_name: String,
    pub agent_name: String,
    pub session_id: String,
    pub parameters: Value,
    pub started_at: DateTime<Utc>,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionRecord {
    pub fn starting(
        tool_id: Uuid,
        tool_name: impl Into<String>,
        agent_name: impl Into<String>,
        session_id: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            seq: 0,
            tool_id,
            tool_name: tool_name.into(),
            agent_name: agent_name.into(),
            session_id: session_id.into(),
            parameters,
            started_at: Utc::now(),
            status: ToolStatus::Starting,
            ended_at: None,
            result: None,
            error: None,
        }
    }

    pub fn running(mut self) -> Self {
        self.status = ToolStatus::Running;
        self
    }

    pub fn completed(mut self, result: Value) -> Self {
        self.status = ToolStatus::Completed;
        self.ended_at = Some(Utc::now());
        self.result = Some(result);
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = ToolStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let record = ToolExecutionRecord::starting(
            Uuid::new_v4(),
            "customer_lookup",
            "CrmAgent",
            "s1",
            serde_json::json!({"query": "acme"}),
        );
        assert_eq!(record.status, ToolStatus::Starting);
        assert!(!record.status.is_terminal());

        let running = record.clone().running();
        assert_eq!(running.status, ToolStatus::Running);

        let done = running.completed(serde_json::json!({"matches": 1}));
        assert_eq!(done.status, ToolStatus::Completed);
        assert!(done.status.is_terminal());
        assert!(done.ended_at.is_some());
        assert!(done.error.is_none());
    }

    #[test]
    fn failure_carries_error_not_result() {
        let record = ToolExecutionRecord::starting(
            Uuid::new_v4(),
            "order_status",
            "CrmAgent",
            "s1",
            serde_json::json!({}),
        )
        .failed("upstream 503");
        assert_eq!(record.status, ToolStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("upstream 503"));
        assert!(record.result.is_none());
    }
}
