//! Agent capability descriptors — every registered agent advertises these.
//! The selection engine scores capabilities; it never inspects agent
//! internals.

use serde::{Deserialize, Serialize};

/// Whether an agent is a single responder or a coordinating agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Individual,
    Agency,
}

/// Basic identity of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub version: String,
    pub kind: AgentKind,
}

/// Static advertisement of what an agent can do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub name: String,
    pub version: String,
    pub kind: AgentKind,
    /// Feature tags matched against the input during capability scoring.
    pub features: Vec<String>,
    pub supported_modes: Vec<String>,
    pub supports_tools: bool,
    pub supports_state_sharing: bool,
}

impl AgentCapabilities {
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AgentKind::Individual).unwrap(),
            "\"individual\""
        );
        assert_eq!(
            serde_json::to_string(&AgentKind::Agency).unwrap(),
            "\"agency\""
        );
    }

    #[test]
    fn info_mirrors_descriptor_identity() {
        let caps = AgentCapabilities {
            name: "AnalyticalAgent".into(),
            version: "1.0.0".into(),
            kind: AgentKind::Individual,
            features: vec!["analysis".into()],
            supported_modes: vec!["interactive".into()],
            supports_tools: false,
            supports_state_sharing: true,
        };
        let info = caps.info();
        assert_eq!(info.name, "AnalyticalAgent");
        assert_eq!(info.kind, AgentKind::Individual);
    }
}
