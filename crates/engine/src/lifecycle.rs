//! Engine assembly and supervision.
//!
//! Start order: session store → memory adapter → registry/cache →
//! orchestrator. Stop is the reverse: intake stops, in-flight requests are
//! cancelled, the remember queue drains up to its bounded deadline, and
//! cached agents quiesce before disposal.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use sg_agents::{AgentFactory, AgentRegistry, StandardAgentFactory};
use sg_domain::config::Config;
use sg_domain::error::Result;
use sg_llm::LlmProvider;
use sg_memory::{MemoryProvider, RememberQueue};
use sg_sessions::{SessionLockMap, SessionStore};

use crate::cache::AgentCache;
use crate::cancel::CancelMap;
use crate::handoff::{HandoffCoordinator, HandoffOutcome, HandoffRequest};
use crate::state::Engine;

impl Engine {
    /// Assemble and start the engine with the standard agent set.
    pub fn start(config: Config, llm: Arc<dyn LlmProvider>) -> Result<Arc<Engine>> {
        let memory = sg_memory::create_provider(&config.memory)?;
        let factory: Arc<dyn AgentFactory> = Arc::new(StandardAgentFactory::new(llm));
        Self::start_with(config, memory, factory)
    }

    /// Assemble and start the engine from explicit services (tests swap in
    /// their own memory providers and factories here).
    pub fn start_with(
        config: Config,
        memory: Arc<dyn MemoryProvider>,
        factory: Arc<dyn AgentFactory>,
    ) -> Result<Arc<Engine>> {
        let config = Arc::new(config);

        // 1. Session store.
        let sessions = Arc::new(SessionStore::new(
            &config.sessions,
            config.orchestrator.agent_history_cap,
        )?);

        // 2. Memory workers.
        let remember_queue = RememberQueue::start(
            memory.clone(),
            config.memory.remember_queue_cap,
            config.memory.remember_workers,
        );

        // 3. Registry and lazy cache.
        let registry = Arc::new(AgentRegistry::new());
        let agents = AgentCache::new(
            registry.clone(),
            factory.clone(),
            config.orchestrator.max_cached_agents,
            Duration::from_secs(config.orchestrator.agent_idle_minutes * 60),
        );
        agents.start_sweeper();

        // 4. Orchestrator plumbing.
        let handoffs = HandoffCoordinator::new(
            sessions.clone(),
            Duration::from_millis(config.orchestrator.handoff_timeout_ms),
        );

        tracing::info!(
            agents = factory.profiles().len(),
            fallback = ?config.orchestrator.fallback_strategy,
            "engine started"
        );

        Ok(Arc::new(Engine {
            config,
            sessions,
            session_locks: Arc::new(SessionLockMap::new()),
            memory,
            remember_queue,
            registry,
            factory,
            agents,
            cancel_map: Arc::new(CancelMap::new()),
            handoffs,
            accepting: AtomicBool::new(true),
        }))
    }

    /// Graceful stop: refuse new requests, cancel in-flight ones, drain
    /// the remember backlog up to its deadline, then quiesce the cache.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!("engine shutting down");
        self.stop_accepting();
        self.cancel_map.cancel_all();

        self.remember_queue
            .drain(Duration::from_millis(self.config.memory.drain_deadline_ms))
            .await;
        self.agents.cleanup(grace).await;
        self.session_locks.prune_idle();
        tracing::info!("engine stopped");
    }

    /// Cancel the in-flight request for a session, if any.
    pub fn cancel_request(&self, session_id: &str) -> bool {
        self.cancel_map.cancel(session_id)
    }

    /// Remove a session everywhere: logs, index entry, and memory keys.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.delete_session(session_id)?;
        if let Err(e) = self.memory.forget_session(session_id).await {
            tracing::warn!(
                session_id = session_id,
                error = %e,
                "failed to drop session memory keys"
            );
        }
        Ok(())
    }

    /// Transfer conversational control between agents within a session.
    pub async fn handoff(
        &self,
        from_agent: &str,
        to_agent: &str,
        request: HandoffRequest,
    ) -> HandoffOutcome {
        let known = self.agent_known(to_agent);
        self.handoffs
            .handoff(from_agent, to_agent, request, known)
            .await
    }
}
