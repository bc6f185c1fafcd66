use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session store location and per-session preference defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory for the session index, message logs, and tool logs.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,

    /// Default `cross_session_memory` preference for new sessions.
    #[serde(default)]
    pub cross_session_memory_default: bool,

    /// Default `agent_lock` preference for new sessions.
    #[serde(default)]
    pub agent_lock_default: bool,

    /// Title given to sessions created implicitly by an inbound request.
    #[serde(default = "d_default_title")]
    pub default_title: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            cross_session_memory_default: false,
            agent_lock_default: false,
            default_title: d_default_title(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_default_title() -> String {
    "New conversation".into()
}
