//! Inter-agent handoff.
//!
//! Transfers conversational control within a session: verifies the target
//! is a known agent, atomically rewrites the session's active/previous
//! agent and history, stores the handoff record in session shared state,
//! and produces a terse transition message chosen deterministically from a
//! fixed phrase set so tests can pin it down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sg_domain::session::HandoffRecord;
use sg_domain::trace::TraceEvent;
use sg_sessions::SessionStore;

/// Caller-supplied context for a handoff.
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    pub session_id: String,
    pub reason: String,
    pub conversation_summary: String,
    pub user_intent: String,
}

/// What the initiating agent gets back.
#[derive(Debug, Clone)]
pub struct HandoffOutcome {
    pub ok: bool,
    pub new_agent: String,
    pub transition_message: Option<String>,
    pub error: Option<String>,
}

const TRANSITION_PHRASES: usize = 8;

/// Deterministic transition phrase: the choice depends only on the session
/// id, so a session always hands off with the same voice.
fn transition_message(session_id: &str, to_agent: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    session_id.hash(&mut hasher);
    match hasher.finish() as usize % TRANSITION_PHRASES {
        0 => format!("Handing this over to {to_agent}."),
        1 => format!("{to_agent} is better placed for this — switching now."),
        2 => format!("Bringing in {to_agent} to continue."),
        3 => format!("Passing the conversation to {to_agent}."),
        4 => format!("{to_agent} will take it from here."),
        5 => format!("Switching you to {to_agent}."),
        6 => format!("Let me hand you to {to_agent} for this."),
        _ => format!("{to_agent} is taking over this thread."),
    }
}

pub struct HandoffCoordinator {
    store: Arc<SessionStore>,
    timeout: Duration,
}

impl HandoffCoordinator {
    pub fn new(store: Arc<SessionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Transfer control from `from_agent` to `to_agent`. `target_known`
    /// reflects the catalog check done by the engine; on any failure the
    /// session state is unchanged and the current agent is retained.
    pub async fn handoff(
        &self,
        from_agent: &str,
        to_agent: &str,
        request: HandoffRequest,
        target_known: bool,
    ) -> HandoffOutcome {
        if !target_known {
            return HandoffOutcome {
                ok: false,
                new_agent: from_agent.to_owned(),
                transition_message: None,
                error: Some(format!("agent not found: {to_agent}")),
            };
        }

        let record = HandoffRecord {
            from_agent: from_agent.to_owned(),
            to_agent: to_agent.to_owned(),
            timestamp: Utc::now(),
            reason: request.reason,
            conversation_summary: request.conversation_summary,
            user_intent: request.user_intent,
        };

        let store = self.store.clone();
        let session_id = request.session_id.clone();
        let apply = async move { store.apply_handoff(&session_id, record) };

        match tokio::time::timeout(self.timeout, apply).await {
            Ok(Ok(_meta)) => {
                TraceEvent::HandoffApplied {
                    session_id: request.session_id.clone(),
                    from_agent: from_agent.to_owned(),
                    to_agent: to_agent.to_owned(),
                }
                .emit();
                HandoffOutcome {
                    ok: true,
                    new_agent: to_agent.to_owned(),
                    transition_message: Some(transition_message(&request.session_id, to_agent)),
                    error: None,
                }
            }
            Ok(Err(e)) => HandoffOutcome {
                ok: false,
                new_agent: from_agent.to_owned(),
                transition_message: None,
                error: Some(e.to_string()),
            },
            Err(_) => HandoffOutcome {
                ok: false,
                new_agent: from_agent.to_owned(),
                transition_message: None,
                error: Some("handoff timed out".into()),
            },
        }
    }
}
