//! Shared engine state: the process-wide services and the agent catalog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sg_agents::{AgentFactory, AgentProfile, AgentRegistry};
use sg_domain::config::Config;
use sg_memory::{MemoryProvider, RememberQueue};
use sg_sessions::{SessionLockMap, SessionStore};

use crate::cache::AgentCache;
use crate::cancel::CancelMap;
use crate::handoff::HandoffCoordinator;

/// The orchestration engine: every request pipeline runs against this.
///
/// Fields are grouped by concern; all services are process-wide singletons
/// with their own internal synchronization. The engine itself holds no
/// per-request mutable state.
pub struct Engine {
    // ── Configuration ────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Session state ────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub session_locks: Arc<SessionLockMap>,

    // ── Memory ───────────────────────────────────────────────────────
    pub memory: Arc<dyn MemoryProvider>,
    pub remember_queue: Arc<RememberQueue>,

    // ── Agents ───────────────────────────────────────────────────────
    pub registry: Arc<AgentRegistry>,
    pub factory: Arc<dyn AgentFactory>,
    pub agents: Arc<AgentCache>,

    // ── Supervision ──────────────────────────────────────────────────
    pub cancel_map: Arc<CancelMap>,
    pub handoffs: HandoffCoordinator,
    pub(crate) accepting: AtomicBool,
}

impl Engine {
    /// Registered agents plus lazily constructible kinds, deduplicated
    /// (a live registration shadows the factory's static profile).
    pub fn catalog(&self) -> Vec<AgentProfile> {
        let mut profiles = self.registry.snapshot();
        for profile in self.factory.profiles() {
            if !profiles.iter().any(|p| p.name() == profile.name()) {
                profiles.push(profile);
            }
        }
        profiles.sort_by(|a, b| a.name().cmp(b.name()));
        profiles
    }

    pub fn agent_known(&self, name: &str) -> bool {
        self.registry.contains(name) || self.factory.knows(name)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }
}
