use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Memory backend selection and latency budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Backend kind. `null` keeps everything in-process and remembers
    /// nothing; `rest` talks to an external memory service.
    #[serde(default)]
    pub backend: MemoryBackend,

    /// Base URL of the REST backend (required when `backend = "rest"`).
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Hard budget for `recall`; expiry yields an empty context.
    #[serde(default = "d_recall_budget_ms")]
    pub recall_budget_ms: u64,

    /// Request timeout for individual backend calls.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "d_max_retries")]
    pub max_retries: u32,

    /// Bounded queue feeding the async remember workers.
    #[serde(default = "d_remember_queue_cap")]
    pub remember_queue_cap: usize,

    /// Worker shards draining the remember queue (per-session FIFO is
    /// preserved by sharding on session id).
    #[serde(default = "d_remember_workers")]
    pub remember_workers: usize,

    /// How long shutdown waits for queued remember submissions to drain.
    #[serde(default = "d_drain_deadline_ms")]
    pub drain_deadline_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::Null,
            base_url: String::new(),
            api_key: None,
            recall_budget_ms: d_recall_budget_ms(),
            request_timeout_ms: d_request_timeout_ms(),
            max_retries: d_max_retries(),
            remember_queue_cap: d_remember_queue_cap(),
            remember_workers: d_remember_workers(),
            drain_deadline_ms: d_drain_deadline_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    #[default]
    Null,
    Rest,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_recall_budget_ms() -> u64 {
    2_000
}
fn d_request_timeout_ms() -> u64 {
    5_000
}
fn d_max_retries() -> u32 {
    2
}
fn d_remember_queue_cap() -> usize {
    256
}
fn d_remember_workers() -> usize {
    2
}
fn d_drain_deadline_ms() -> u64 {
    5_000
}
