//! Session metadata tracked by the session index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-session user preferences controlling continuity and memory policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserPreferences {
    #[serde(default)]
    pub cross_session_memory: bool,
    /// When set, selection reuses `preferred_agent` (or `last_agent_used`)
    /// across turns regardless of input content.
    #[serde(default)]
    pub agent_lock: bool,
    #[serde(default)]
    pub preferred_agent: Option<String>,
    #[serde(default)]
    pub last_agent_used: Option<String>,
    #[serde(default)]
    pub agent_lock_since: Option<DateTime<Utc>>,
}

/// Partial update for [`UserPreferences`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesPatch {
    pub cross_session_memory: Option<bool>,
    pub agent_lock: Option<bool>,
    pub preferred_agent: Option<String>,
    pub last_agent_used: Option<String>,
}

impl UserPreferences {
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(v) = patch.cross_session_memory {
            self.cross_session_memory = v;
        }
        if let Some(v) = patch.agent_lock {
            self.agent_lock = v;
            self.agent_lock_since = if v { Some(Utc::now()) } else { None };
        }
        if let Some(v) = &patch.preferred_agent {
            self.preferred_agent = Some(v.clone());
        }
        if let Some(v) = &patch.last_agent_used {
            self.last_agent_used = Some(v.clone());
        }
    }
}

/// One entry in a session's bounded agent-selection history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHistoryEntry {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_from: Option<String>,
}

/// A handoff record kept in session shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub from_agent: String,
    pub to_agent: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub conversation_summary: String,
    pub user_intent: String,
}

/// Index entry for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Derived from the message log; the log is authoritative on mismatch.
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_agent: Option<String>,
    #[serde(default)]
    pub previous_agent: Option<String>,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub agent_history: Vec<AgentHistoryEntry>,
    #[serde(default)]
    pub handoffs: Vec<HandoffRecord>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl SessionMeta {
    pub fn new(session_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            title: title.into(),
            created_at: now,
            last_message_at: now,
            message_count: 0,
            unread_count: 0,
            last_read_at: None,
            active_agent: None,
            previous_agent: None,
            preferences: UserPreferences::default(),
            agent_history: Vec::new(),
            handoffs: Vec::new(),
            metadata: None,
        }
    }

    /// Append to the agent history, evicting the oldest entry past `cap`.
    pub fn push_history(&mut self, entry: AgentHistoryEntry, cap: usize) {
        self.agent_history.push(entry);
        while self.agent_history.len() > cap {
            self.agent_history.remove(0);
        }
    }

    /// The agent the lock policy would reuse, when one is recorded.
    pub fn locked_agent(&self) -> Option<&str> {
        if !self.preferences.agent_lock {
            return None;
        }
        self.preferences
            .preferred_agent
            .as_deref()
            .or(self.preferences.last_agent_used.as_deref())
    }
}
