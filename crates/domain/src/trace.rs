use serde::Serialize;

/// Structured trace events emitted across all ChatSG crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    MessageAppended {
        session_id: String,
        seq: u64,
        kind: String,
    },
    IndexRebuilt {
        session_id: String,
        indexed_count: u64,
        log_count: u64,
    },
    AgentSelected {
        session_id: String,
        agent: String,
        confidence: f32,
        reason: String,
    },
    HandoffApplied {
        session_id: String,
        from_agent: String,
        to_agent: String,
    },
    MemoryRecall {
        session_id: String,
        duration_ms: u64,
        timed_out: bool,
    },
    RememberQueued {
        session_id: String,
        shard: usize,
        depth: usize,
    },
    ToolTransition {
        session_id: String,
        tool_name: String,
        status: String,
    },
    AgentCacheHit {
        agent_kind: String,
    },
    AgentCacheMiss {
        agent_kind: String,
    },
    AgentCacheEvicted {
        agent_kind: String,
        idle_secs: u64,
    },
    StreamClosed {
        session_id: String,
        terminal: String,
        events: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sg_event");
    }
}
