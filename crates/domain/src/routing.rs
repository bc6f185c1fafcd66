//! Routing inputs and selection outputs.

use serde::{Deserialize, Serialize};

/// Resolved routing metadata supplied by the caller (e.g. from a slash
/// command). The command catalog is parsed upstream; the engine only sees
/// the resolved result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingMetadata {
    #[serde(default)]
    pub force_agent: bool,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub command_name: Option<String>,
    /// 1.0 when forced.
    #[serde(default)]
    pub confidence: f32,
}

impl RoutingMetadata {
    pub fn forced(agent_type: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            force_agent: true,
            agent_type: Some(agent_type.into()),
            command_name: Some(command.into()),
            confidence: 1.0,
        }
    }
}

/// The outcome of agent selection.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSelection {
    pub agent: String,
    pub confidence: f32,
    pub reason: String,
    /// Alternative agents in descending preference order, tried on failure.
    pub fallback_agents: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_constructor_sets_full_confidence() {
        let routing = RoutingMetadata::forced("CreativeAgent", "creative");
        assert!(routing.force_agent);
        assert_eq!(routing.agent_type.as_deref(), Some("CreativeAgent"));
        assert_eq!(routing.command_name.as_deref(), Some("creative"));
        assert!((routing.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn metadata_deserializes_from_partial_json() {
        let routing: RoutingMetadata =
            serde_json::from_str(r#"{"force_agent": true, "agent_type": "CrmAgent"}"#).unwrap();
        assert!(routing.force_agent);
        assert_eq!(routing.agent_type.as_deref(), Some("CrmAgent"));
        assert!(routing.command_name.is_none());
    }
}
