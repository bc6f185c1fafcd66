//! The session store: index + per-session message and tool logs.
//!
//! The index (`sessions.json`) carries session metadata — preferences,
//! unread counters, agent history. Message content lives in append-only
//! JSONL logs; the log is authoritative for `message_count` and the index
//! is rebuilt from it when a mismatch is detected on read.
//!
//! Appends and unread mutations for one session are serialized by a
//! per-session append lock so the assistant-append + unread-increment pair
//! is atomic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use sg_domain::config::SessionsConfig;
use sg_domain::error::{Error, Result};
use sg_domain::message::{Message, MessageKind, MessagePage};
use sg_domain::session::{
    AgentHistoryEntry, HandoffRecord, PreferencesPatch, SessionMeta,
};
use sg_domain::trace::TraceEvent;

use crate::log::MessageLog;
use crate::tool_log::ToolLog;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    index_path: PathBuf,
    index: RwLock<HashMap<String, SessionMeta>>,
    append_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    messages: MessageLog,
    tools: Arc<ToolLog>,
    defaults: SessionsConfig,
    history_cap: usize,
}

impl SessionStore {
    /// Load or create the store under `cfg.state_path`.
    pub fn new(cfg: &SessionsConfig, history_cap: usize) -> Result<Self> {
        std::fs::create_dir_all(&cfg.state_path).map_err(Error::Io)?;

        let index_path = cfg.state_path.join("sessions.json");
        let index: HashMap<String, SessionMeta> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        let messages = MessageLog::new(&cfg.state_path.join("messages"))?;
        let tools = Arc::new(ToolLog::new(&cfg.state_path.join("tools"))?);

        tracing::info!(
            sessions = index.len(),
            path = %index_path.display(),
            "session store loaded"
        );

        Ok(Self {
            index_path,
            index: RwLock::new(index),
            append_locks: Mutex::new(HashMap::new()),
            messages,
            tools,
            defaults: cfg.clone(),
            history_cap,
        })
    }

    /// The tool log shared with tool contexts.
    pub fn tool_log(&self) -> Arc<ToolLog> {
        self.tools.clone()
    }

    // ── session lifecycle ────────────────────────────────────────────

    /// Create a session with a generated id.
    pub fn create_session(
        &self,
        title: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<SessionMeta> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.insert_session(&session_id, title, metadata)
    }

    /// Fetch a session, creating it with defaults when absent.
    /// Returns `(meta, is_new)`.
    pub fn get_or_create(&self, session_id: &str) -> Result<(SessionMeta, bool)> {
        if let Some(meta) = self.get_session(session_id) {
            return Ok((meta, false));
        }
        let meta = self.insert_session(session_id, None, None)?;
        Ok((meta, true))
    }

    fn insert_session(
        &self,
        session_id: &str,
        title: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<SessionMeta> {
        let mut meta = SessionMeta::new(
            session_id,
            title.unwrap_or(&self.defaults.default_title),
        );
        meta.preferences.cross_session_memory = self.defaults.cross_session_memory_default;
        meta.preferences.agent_lock = self.defaults.agent_lock_default;
        meta.metadata = metadata;

        {
            let mut index = self.index.write();
            index.insert(session_id.to_owned(), meta.clone());
        }
        self.flush_index();

        TraceEvent::SessionResolved {
            session_id: session_id.to_owned(),
            is_new: true,
        }
        .emit();

        Ok(meta)
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionMeta> {
        self.index.read().get(session_id).cloned()
    }

    /// All sessions ordered by `last_message_at` descending.
    pub fn list_sessions(&self) -> Vec<SessionMeta> {
        let mut sessions: Vec<SessionMeta> = self.index.read().values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Remove the session's index entry, message log, and tool log.
    /// Memory keys scoped to the session are the caller's concern.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let existed = self.index.write().remove(session_id).is_some();
        if !existed {
            return Err(Error::SessionNotFound(session_id.to_owned()));
        }
        self.flush_index();
        self.messages.remove(session_id)?;
        self.tools.remove(session_id)?;
        self.append_locks.lock().remove(session_id);
        Ok(())
    }

    // ── appends ──────────────────────────────────────────────────────

    /// Atomic append: assigns the next monotonic seq, writes the log record,
    /// then updates the index. Returns the assigned seq.
    pub fn append_message(&self, session_id: &str, msg: Message) -> Result<u64> {
        self.append_inner(session_id, msg, None)
    }

    /// Append an assistant message and bump the unread counter iff the
    /// caller's active session is a different one. The increment is atomic
    /// with the append (same per-session lock).
    pub fn append_assistant(
        &self,
        session_id: &str,
        msg: Message,
        caller_active_session: Option<&str>,
    ) -> Result<u64> {
        self.append_inner(session_id, msg, caller_active_session)
    }

    fn append_inner(
        &self,
        session_id: &str,
        mut msg: Message,
        caller_active_session: Option<&str>,
    ) -> Result<u64> {
        let lock = self.append_lock(session_id);
        let _guard = lock.lock();

        let seq = {
            let index = self.index.read();
            let meta = index
                .get(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            meta.message_count + 1
        };

        msg.seq = seq;
        self.messages.append(session_id, &msg)?;

        let kind = msg.kind;
        let increment_unread = kind == MessageKind::Assistant
            && matches!(caller_active_session, Some(active) if active != session_id);

        {
            let mut index = self.index.write();
            if let Some(meta) = index.get_mut(session_id) {
                meta.message_count = seq;
                meta.last_message_at = msg.timestamp;
                if increment_unread {
                    meta.unread_count += 1;
                }
            }
        }
        self.flush_index();

        TraceEvent::MessageAppended {
            session_id: session_id.to_owned(),
            seq,
            kind: format!("{kind:?}").to_lowercase(),
        }
        .emit();

        Ok(seq)
    }

    /// Bump the unread counter iff `caller_active_session` names a
    /// different session. No-op (Ok) otherwise.
    pub fn increment_unread_if_background(
        &self,
        session_id: &str,
        caller_active_session: &str,
    ) -> Result<()> {
        if caller_active_session == session_id {
            return Ok(());
        }
        let lock = self.append_lock(session_id);
        let _guard = lock.lock();
        {
            let mut index = self.index.write();
            let meta = index
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            meta.unread_count += 1;
        }
        self.flush_index();
        Ok(())
    }

    // ── reads ────────────────────────────────────────────────────────

    /// An ordered slice of the message log. Detects index drift and
    /// rebuilds from the log before answering.
    pub fn read_messages(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<MessagePage> {
        if self.get_session(session_id).is_none() {
            return Err(Error::SessionNotFound(session_id.to_owned()));
        }

        let all = self.messages.read_all(session_id)?;
        let total = all.len() as u64;

        let indexed = self
            .get_session(session_id)
            .map(|m| m.message_count)
            .unwrap_or(0);
        if indexed != total {
            self.rebuild_index(session_id, &all, indexed);
        }

        let end = (offset + limit).min(all.len());
        let messages = if offset >= all.len() {
            Vec::new()
        } else {
            all[offset..end].to_vec()
        };
        let has_more = end < all.len();

        Ok(MessagePage {
            messages,
            has_more,
            total,
        })
    }

    /// Deterministic rebuild: count and last-message time come straight
    /// from the log.
    fn rebuild_index(&self, session_id: &str, log: &[Message], indexed: u64) {
        let log_count = log.len() as u64;
        tracing::warn!(
            session_id = session_id,
            indexed_count = indexed,
            log_count,
            "index message_count mismatch, rebuilding from log"
        );
        {
            let mut index = self.index.write();
            if let Some(meta) = index.get_mut(session_id) {
                meta.message_count = log_count;
                if let Some(last) = log.last() {
                    meta.last_message_at = last.timestamp;
                }
            }
        }
        self.flush_index();

        TraceEvent::IndexRebuilt {
            session_id: session_id.to_owned(),
            indexed_count: indexed,
            log_count,
        }
        .emit();
    }

    // ── metadata mutations ───────────────────────────────────────────

    /// Reset the unread counter and stamp `last_read_at`. Idempotent.
    pub fn mark_read(&self, session_id: &str) -> Result<SessionMeta> {
        let updated = {
            let mut index = self.index.write();
            let meta = index
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            meta.unread_count = 0;
            meta.last_read_at = Some(Utc::now());
            meta.clone()
        };
        self.flush_index();
        Ok(updated)
    }

    pub fn update_preferences(
        &self,
        session_id: &str,
        patch: &PreferencesPatch,
    ) -> Result<SessionMeta> {
        let updated = {
            let mut index = self.index.write();
            let meta = index
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            meta.preferences.apply(patch);
            meta.clone()
        };
        self.flush_index();
        Ok(updated)
    }

    /// Ring-buffered append to the agent history.
    pub fn append_agent_history(
        &self,
        session_id: &str,
        entry: AgentHistoryEntry,
    ) -> Result<()> {
        {
            let mut index = self.index.write();
            let meta = index
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            meta.push_history(entry, self.history_cap);
        }
        self.flush_index();
        Ok(())
    }

    /// Record which agent is driving the session.
    pub fn set_active_agent(&self, session_id: &str, agent: &str) -> Result<()> {
        {
            let mut index = self.index.write();
            let meta = index
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            if meta.active_agent.as_deref() != Some(agent) {
                meta.previous_agent = meta.active_agent.take();
                meta.active_agent = Some(agent.to_owned());
            }
        }
        self.flush_index();
        Ok(())
    }

    /// Apply a handoff atomically: on any failure the session is unchanged.
    pub fn apply_handoff(&self, session_id: &str, record: HandoffRecord) -> Result<SessionMeta> {
        let mut index = self.index.write();
        let meta = index
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;

        // Mutate a clone; commit only after the index persists.
        let mut updated = meta.clone();
        updated.previous_agent = Some(record.from_agent.clone());
        updated.active_agent = Some(record.to_agent.clone());
        updated.push_history(
            AgentHistoryEntry {
                agent_name: record.to_agent.clone(),
                timestamp: record.timestamp,
                confidence: 1.0,
                reason: record.reason.clone(),
                handoff_from: Some(record.from_agent.clone()),
            },
            self.history_cap,
        );
        updated.handoffs.push(record);

        let json = {
            let mut snapshot: HashMap<&str, &SessionMeta> =
                index.iter().map(|(k, v)| (k.as_str(), v)).collect();
            snapshot.insert(session_id, &updated);
            serde_json::to_string_pretty(&snapshot)
                .map_err(|e| Error::Write(format!("serializing session index: {e}")))?
        };
        std::fs::write(&self.index_path, json)
            .map_err(|e| Error::Write(format!("writing session index: {e}")))?;

        if let Some(slot) = index.get_mut(session_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    // ── internals ────────────────────────────────────────────────────

    fn append_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.append_locks
            .lock()
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Persist the index. The log is authoritative, so a failed flush is
    /// logged rather than surfaced.
    fn flush_index(&self) {
        let index = self.index.read();
        match serde_json::to_string_pretty(&*index) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.index_path, json) {
                    tracing::warn!(error = %e, "failed to persist session index");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize session index"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SessionsConfig {
            state_path: dir.path().to_path_buf(),
            ..SessionsConfig::default()
        };
        let store = SessionStore::new(&cfg, 50).unwrap();
        (dir, store)
    }

    #[test]
    fn append_assigns_monotonic_seq() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();

        let s1 = store.append_message("s1", Message::user("one")).unwrap();
        let s2 = store.append_message("s1", Message::user("two")).unwrap();
        let s3 = store
            .append_assistant("s1", Message::assistant("three", "TechnicalAgent"), None)
            .unwrap();

        assert_eq!((s1, s2, s3), (1, 2, 3));
        assert_eq!(store.get_session("s1").unwrap().message_count, 3);
    }

    #[test]
    fn append_to_unknown_session_fails() {
        let (_dir, store) = store();
        let err = store.append_message("ghost", Message::user("hi")).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn pagination_round_trip() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();
        for i in 0..5 {
            store
                .append_message("s1", Message::user(format!("msg {i}")))
                .unwrap();
        }

        let page = store.read_messages("s1", 1, 2).unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].content, "msg 1");
        assert_eq!(page.messages[0].seq, 2);

        let tail = store.read_messages("s1", 4, 10).unwrap();
        assert!(!tail.has_more);
        assert_eq!(tail.messages.len(), 1);

        let beyond = store.read_messages("s1", 99, 10).unwrap();
        assert!(beyond.messages.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn unread_increments_only_for_background_sessions() {
        let (_dir, store) = store();
        store.get_or_create("a").unwrap();
        store.get_or_create("b").unwrap();

        // Caller is viewing session "a"; reply lands in "b" → background.
        store
            .append_assistant("b", Message::assistant("hi", "CreativeAgent"), Some("a"))
            .unwrap();
        assert_eq!(store.get_session("b").unwrap().unread_count, 1);

        // Reply into the session being viewed → no increment.
        store
            .append_assistant("a", Message::assistant("hi", "CreativeAgent"), Some("a"))
            .unwrap();
        assert_eq!(store.get_session("a").unwrap().unread_count, 0);

        // Unknown viewer → treated as foreground, no increment.
        store
            .append_assistant("b", Message::assistant("again", "CreativeAgent"), None)
            .unwrap();
        assert_eq!(store.get_session("b").unwrap().unread_count, 1);

        // User messages never count as unread.
        store.append_message("b", Message::user("q")).unwrap();
        assert_eq!(store.get_session("b").unwrap().unread_count, 1);
    }

    #[test]
    fn mark_read_resets_and_is_idempotent() {
        let (_dir, store) = store();
        store.get_or_create("b").unwrap();
        store
            .append_assistant("b", Message::assistant("hi", "CreativeAgent"), Some("a"))
            .unwrap();

        let first = store.mark_read("b").unwrap();
        assert_eq!(first.unread_count, 0);
        let read_at = first.last_read_at.unwrap();

        let second = store.mark_read("b").unwrap();
        assert_eq!(second.unread_count, 0);
        assert!(second.last_read_at.unwrap() >= read_at);
    }

    #[test]
    fn explicit_unread_increment_is_gated() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();

        store.increment_unread_if_background("s1", "s1").unwrap();
        assert_eq!(store.get_session("s1").unwrap().unread_count, 0);

        store.increment_unread_if_background("s1", "other").unwrap();
        assert_eq!(store.get_session("s1").unwrap().unread_count, 1);
    }

    #[test]
    fn list_orders_by_recency() {
        let (_dir, store) = store();
        store.get_or_create("old").unwrap();
        store.get_or_create("new").unwrap();
        store.append_message("old", Message::user("early")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append_message("new", Message::user("late")).unwrap();

        let sessions = store.list_sessions();
        assert_eq!(sessions[0].session_id, "new");
        assert_eq!(sessions[1].session_id, "old");
    }

    #[test]
    fn delete_removes_logs_and_index() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();
        store.append_message("s1", Message::user("hello")).unwrap();

        store.delete_session("s1").unwrap();
        assert!(store.get_session("s1").is_none());
        assert!(matches!(
            store.read_messages("s1", 0, 10).unwrap_err(),
            Error::SessionNotFound(_)
        ));
        assert!(matches!(
            store.delete_session("s1").unwrap_err(),
            Error::SessionNotFound(_)
        ));
    }

    #[test]
    fn index_rebuilds_from_log_on_mismatch() {
        let (dir, store) = store();
        store.get_or_create("s1").unwrap();
        store.append_message("s1", Message::user("one")).unwrap();
        store.append_message("s1", Message::user("two")).unwrap();
        drop(store);

        // Corrupt the indexed count; the log keeps both records.
        let cfg = SessionsConfig {
            state_path: dir.path().to_path_buf(),
            ..SessionsConfig::default()
        };
        let index_path = dir.path().join("sessions.json");
        let raw = std::fs::read_to_string(&index_path).unwrap();
        let mut parsed: HashMap<String, SessionMeta> = serde_json::from_str(&raw).unwrap();
        parsed.get_mut("s1").unwrap().message_count = 9;
        std::fs::write(&index_path, serde_json::to_string_pretty(&parsed).unwrap()).unwrap();

        let store = SessionStore::new(&cfg, 50).unwrap();
        let page = store.read_messages("s1", 0, 10).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(store.get_session("s1").unwrap().message_count, 2);

        // Subsequent appends continue from the rebuilt count.
        let seq = store.append_message("s1", Message::user("three")).unwrap();
        assert_eq!(seq, 3);
    }

    #[test]
    fn history_is_ring_buffered() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();
        for i in 0..55 {
            store
                .append_agent_history(
                    "s1",
                    AgentHistoryEntry {
                        agent_name: format!("agent-{i}"),
                        timestamp: Utc::now(),
                        confidence: 0.5,
                        reason: "test".into(),
                        handoff_from: None,
                    },
                )
                .unwrap();
        }
        let meta = store.get_session("s1").unwrap();
        assert_eq!(meta.agent_history.len(), 50);
        assert_eq!(meta.agent_history[0].agent_name, "agent-5");
    }

    #[test]
    fn handoff_updates_agents_and_history() {
        let (_dir, store) = store();
        store.get_or_create("s1").unwrap();
        store.set_active_agent("s1", "AnalyticalAgent").unwrap();

        store
            .apply_handoff(
                "s1",
                HandoffRecord {
                    from_agent: "AnalyticalAgent".into(),
                    to_agent: "CreativeAgent".into(),
                    timestamp: Utc::now(),
                    reason: "user asked for a story".into(),
                    conversation_summary: "numbers were discussed".into(),
                    user_intent: "storytelling".into(),
                },
            )
            .unwrap();

        let meta = store.get_session("s1").unwrap();
        assert_eq!(meta.active_agent.as_deref(), Some("CreativeAgent"));
        assert_eq!(meta.previous_agent.as_deref(), Some("AnalyticalAgent"));
        let last = meta.agent_history.last().unwrap();
        assert_eq!(last.agent_name, "CreativeAgent");
        assert_eq!(last.handoff_from.as_deref(), Some("AnalyticalAgent"));
        assert_eq!(meta.handoffs.len(), 1);
    }

    #[test]
    fn handoff_to_unknown_session_leaves_no_trace() {
        let (_dir, store) = store();
        let err = store
            .apply_handoff(
                "ghost",
                HandoffRecord {
                    from_agent: "A".into(),
                    to_agent: "B".into(),
                    timestamp: Utc::now(),
                    reason: String::new(),
                    conversation_summary: String::new(),
                    user_intent: String::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn preferences_patch_persists_across_reload() {
        let (dir, store) = store();
        store.get_or_create("s1").unwrap();
        store
            .update_preferences(
                "s1",
                &PreferencesPatch {
                    agent_lock: Some(true),
                    preferred_agent: Some("CrmAgent".into()),
                    ..PreferencesPatch::default()
                },
            )
            .unwrap();
        drop(store);

        let cfg = SessionsConfig {
            state_path: dir.path().to_path_buf(),
            ..SessionsConfig::default()
        };
        let store = SessionStore::new(&cfg, 50).unwrap();
        let meta = store.get_session("s1").unwrap();
        assert!(meta.preferences.agent_lock);
        assert_eq!(meta.preferences.preferred_agent.as_deref(), Some("CrmAgent"));
    }

    #[test]
    fn new_sessions_take_preference_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SessionsConfig {
            state_path: dir.path().to_path_buf(),
            cross_session_memory_default: true,
            agent_lock_default: false,
            ..SessionsConfig::default()
        };
        let store = SessionStore::new(&cfg, 50).unwrap();
        let (meta, is_new) = store.get_or_create("s1").unwrap();
        assert!(is_new);
        assert!(meta.preferences.cross_session_memory);
        assert!(!meta.preferences.agent_lock);
    }
}
