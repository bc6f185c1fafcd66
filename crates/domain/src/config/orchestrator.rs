use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request-pipeline and agent-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of lazily constructed agents kept alive.
    #[serde(default = "d_max_cached_agents")]
    pub max_cached_agents: usize,

    /// Cached agents idle longer than this are evicted by the sweeper.
    #[serde(default = "d_agent_idle_minutes")]
    pub agent_idle_minutes: u64,

    /// Hard ceiling for one agent execution.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Per-tool execution ceiling.
    #[serde(default = "d_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    /// Ceiling for a handoff operation.
    #[serde(default = "d_handoff_timeout_ms")]
    pub handoff_timeout_ms: u64,

    /// What to do when the selected agent fails.
    #[serde(default)]
    pub fallback_strategy: FallbackStrategy,

    /// Whether agents may read shared session state (handoff records).
    #[serde(default = "d_true")]
    pub enable_state_sharing: bool,

    /// Bounded agent-history ring per session.
    #[serde(default = "d_agent_history_cap")]
    pub agent_history_cap: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cached_agents: d_max_cached_agents(),
            agent_idle_minutes: d_agent_idle_minutes(),
            request_timeout_ms: d_request_timeout_ms(),
            tool_timeout_ms: d_tool_timeout_ms(),
            handoff_timeout_ms: d_handoff_timeout_ms(),
            fallback_strategy: FallbackStrategy::default(),
            enable_state_sharing: true,
            agent_history_cap: d_agent_history_cap(),
        }
    }
}

/// Recovery policy when the selected agent fails or times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackStrategy {
    /// Try fallback agents in order, each under a fresh timeout.
    #[default]
    Sequential,
    /// Race fallback agents; first success wins, losers are cancelled.
    Parallel,
    /// No fallback; surface the error.
    BestEffort,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_cached_agents() -> usize {
    3
}
fn d_agent_idle_minutes() -> u64 {
    30
}
fn d_request_timeout_ms() -> u64 {
    30_000
}
fn d_tool_timeout_ms() -> u64 {
    30_000
}
fn d_handoff_timeout_ms() -> u64 {
    5_000
}
fn d_agent_history_cap() -> usize {
    50
}
fn d_true() -> bool {
    true
}
