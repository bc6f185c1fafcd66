//! The agent registry: a thread-safe map from agent name to live agent.
//!
//! Lookup is O(1); enumeration order is unspecified. Selection works on
//! [`AgentProfile`] snapshots so it never holds the registry lock while
//! scoring.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use sg_domain::capability::AgentCapabilities;

use crate::{Agent, AgentProfile};

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent under its advertised name. Replaces any previous
    /// registration of the same name.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.info().name;
        tracing::info!(agent = %name, "registering agent");
        self.agents.write().insert(name, agent);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.agents.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.read().contains_key(name)
    }

    /// Capability descriptors of every registered agent (unordered).
    pub fn list(&self) -> Vec<AgentCapabilities> {
        self.agents
            .read()
            .values()
            .map(|a| a.capabilities())
            .collect()
    }

    /// Profiles (capabilities + keywords) for selection scoring.
    pub fn snapshot(&self) -> Vec<AgentProfile> {
        self.agents
            .read()
            .values()
            .map(|a| AgentProfile {
                capabilities: a.capabilities(),
                keywords: a.keywords().iter().map(|k| (*k).to_owned()).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytical::AnalyticalAgent;
    use crate::creative::CreativeAgent;
    use sg_llm::{LlmProvider, ScriptedProvider};

    fn llm() -> Arc<dyn LlmProvider> {
        Arc::new(ScriptedProvider::new())
    }

    #[test]
    fn register_get_unregister() {
        let registry = AgentRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(AnalyticalAgent::new(llm())));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("AnalyticalAgent"));
        assert!(registry.get("AnalyticalAgent").is_some());

        assert!(registry.unregister("AnalyticalAgent"));
        assert!(!registry.unregister("AnalyticalAgent"));
        assert!(registry.get("AnalyticalAgent").is_none());
    }

    #[test]
    fn snapshot_carries_keywords() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(AnalyticalAgent::new(llm())));
        registry.register(Arc::new(CreativeAgent::new(llm())));

        let profiles = registry.snapshot();
        assert_eq!(profiles.len(), 2);
        let analytical = profiles
            .iter()
            .find(|p| p.name() == "AnalyticalAgent")
            .unwrap();
        assert!(analytical.keywords.iter().any(|k| k == "statistics"));
    }

    #[test]
    fn reregistration_replaces() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(AnalyticalAgent::new(llm())));
        registry.register(Arc::new(AnalyticalAgent::new(llm())));
        assert_eq!(registry.len(), 1);
    }
}
