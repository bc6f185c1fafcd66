//! Agent construction.
//!
//! The factory knows every agent kind the deployment offers, can describe
//! them without constructing anything (static capability advertisements for
//! selection), and builds live agents on demand for the lazy cache.

use std::sync::Arc;

use async_trait::async_trait;

use sg_domain::error::{Error, Result};
use sg_llm::LlmProvider;

use crate::crm::CustomerDirectory;
use crate::{analytical, creative, crm, technical};
use crate::{Agent, AgentProfile};

/// Knows how to describe and build agents by kind name.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    /// Static profiles for every kind this factory can build.
    fn profiles(&self) -> Vec<AgentProfile>;

    fn knows(&self, kind: &str) -> bool {
        self.profiles().iter().any(|p| p.name() == kind)
    }

    /// Construct a live agent. Construction may be expensive; the cache
    /// single-flights concurrent calls for the same kind.
    async fn build(&self, kind: &str) -> Result<Arc<dyn Agent>>;
}

/// Builds the four stock agents.
pub struct StandardAgentFactory {
    llm: Arc<dyn LlmProvider>,
    directory: Arc<CustomerDirectory>,
}

impl StandardAgentFactory {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            directory: Arc::new(CustomerDirectory::with_demo_data()),
        }
    }

    pub fn with_directory(llm: Arc<dyn LlmProvider>, directory: Arc<CustomerDirectory>) -> Self {
        Self { llm, directory }
    }
}

#[async_trait]
impl AgentFactory for StandardAgentFactory {
    fn profiles(&self) -> Vec<AgentProfile> {
        vec![
            AgentProfile {
                capabilities: analytical::capabilities(),
                keywords: analytical::KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            },
            AgentProfile {
                capabilities: creative::capabilities(),
                keywords: creative::KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            },
            AgentProfile {
                capabilities: technical::capabilities(),
                keywords: technical::KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            },
            AgentProfile {
                capabilities: crm::capabilities(),
                keywords: crm::KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            },
        ]
    }

    async fn build(&self, kind: &str) -> Result<Arc<dyn Agent>> {
        match kind {
            analytical::NAME => Ok(Arc::new(analytical::AnalyticalAgent::new(self.llm.clone()))),
            creative::NAME => Ok(Arc::new(creative::CreativeAgent::new(self.llm.clone()))),
            technical::NAME => Ok(Arc::new(technical::TechnicalAgent::new(self.llm.clone()))),
            crm::NAME => Ok(Arc::new(crm::CrmAgent::new(
                self.llm.clone(),
                self.directory.clone(),
            ))),
            other => Err(Error::AgentNotFound(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_llm::ScriptedProvider;

    fn factory() -> StandardAgentFactory {
        StandardAgentFactory::new(Arc::new(ScriptedProvider::new()))
    }

    #[test]
    fn profiles_cover_all_four_agents() {
        let profiles = factory().profiles();
        let names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), 4);
        for expected in ["AnalyticalAgent", "CreativeAgent", "TechnicalAgent", "CrmAgent"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn knows_is_profile_backed() {
        let factory = factory();
        assert!(factory.knows("CrmAgent"));
        assert!(!factory.knows("GhostAgent"));
    }

    #[tokio::test]
    async fn builds_match_their_advertised_names() {
        let factory = factory();
        for profile in factory.profiles() {
            let agent = factory.build(profile.name()).await.unwrap();
            assert_eq!(agent.info().name, profile.name());
        }
    }

    #[tokio::test]
    async fn unknown_kind_errors() {
        let err = factory().build("GhostAgent").await.unwrap_err();
        assert!(matches!(err, Error::AgentNotFound(_)));
    }
}
