//! Per-session cancellation tokens for in-flight requests.
//!
//! Each running request registers a token keyed by session id. Cancelling
//! propagates through child tokens to the LLM stream loop, active tool
//! contexts, and the stream sink.

use std::collections::HashMap;

use parking_lot::Mutex;

use sg_domain::cancel::CancelToken;

/// Tracks the active cancellation token per session.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new token for a session, replacing any
    /// previous registration.
    pub fn register(&self, session_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(session_id.to_owned(), token.clone());
        token
    }

    /// Cancel the running request for a session. Returns true if a token
    /// was registered. Idempotent.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.tokens.lock().get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight request (shutdown).
    pub fn cancel_all(&self) {
        for token in self.tokens.lock().values() {
            token.cancel();
        }
    }

    /// Remove the token once a request completes.
    pub fn remove(&self, session_id: &str) {
        self.tokens.lock().remove(session_id);
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.tokens.lock().contains_key(session_id)
    }
}
