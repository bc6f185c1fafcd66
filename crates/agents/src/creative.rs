//! The creative agent: writing, brainstorming, naming.

use std::sync::Arc;

use async_trait::async_trait;

use sg_domain::capability::{AgentCapabilities, AgentInfo, AgentKind};
use sg_domain::error::Result;
use sg_llm::LlmProvider;

use crate::{build_prompt, stream_reply, Agent, AgentReply, AgentTurn};

pub const NAME: &str = "CreativeAgent";

pub const KEYWORDS: &[&str] = &[
    "write",
    "story",
    "poem",
    "creative",
    "imagine",
    "brainstorm",
    "idea",
    "ideas",
    "draft",
    "slogan",
    "headline",
    "script",
];

const PERSONA: &str = "You are a creative writing assistant. You produce \
vivid, original prose, verse, and ideas. Match the tone the user asks for \
and offer one alternative angle when it helps.";

pub fn capabilities() -> AgentCapabilities {
    AgentCapabilities {
        name: NAME.into(),
        version: "1.0.0".into(),
        kind: AgentKind::Individual,
        features: vec![
            "writing".into(),
            "brainstorming".into(),
            "storytelling".into(),
        ],
        supported_modes: vec!["interactive".into()],
        supports_tools: false,
        supports_state_sharing: true,
    }
}

pub struct CreativeAgent {
    llm: Arc<dyn LlmProvider>,
}

impl CreativeAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for CreativeAgent {
    fn info(&self) -> AgentInfo {
        capabilities().info()
    }

    fn capabilities(&self) -> AgentCapabilities {
        capabilities()
    }

    fn keywords(&self) -> &[&'static str] {
        KEYWORDS
    }

    async fn process(&self, turn: AgentTurn) -> Result<AgentReply> {
        let messages = build_prompt(PERSONA, &turn.memory_context, &turn.input);
        let content =
            stream_reply(&self.llm, &messages, turn.writer.as_ref(), &turn.cancel).await?;
        Ok(AgentReply { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_consistent() {
        let caps = capabilities();
        assert_eq!(caps.name, NAME);
        assert_eq!(caps.kind, AgentKind::Individual);
        assert!(KEYWORDS.contains(&"story"));
    }
}
