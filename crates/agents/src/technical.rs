//! The technical agent: code, debugging, architecture.

use std::sync::Arc;

use async_trait::async_trait;

use sg_domain::capability::{AgentCapabilities, AgentInfo, AgentKind};
use sg_domain::error::Result;
use sg_llm::LlmProvider;

use crate::{build_prompt, stream_reply, Agent, AgentReply, AgentTurn};

pub const NAME: &str = "TechnicalAgent";

pub const KEYWORDS: &[&str] = &[
    "code",
    "bug",
    "error",
    "debug",
    "compile",
    "function",
    "api",
    "rust",
    "python",
    "javascript",
    "stack",
    "implement",
    "refactor",
    "deploy",
];

const PERSONA: &str = "You are a senior software engineer. You answer \
technical questions with working code and short, direct explanations. \
Prefer the simplest fix that is actually correct.";

pub fn capabilities() -> AgentCapabilities {
    AgentCapabilities {
        name: NAME.into(),
        version: "1.0.0".into(),
        kind: AgentKind::Individual,
        features: vec![
            "coding".into(),
            "debugging".into(),
            "architecture".into(),
        ],
        supported_modes: vec!["interactive".into()],
        supports_tools: false,
        supports_state_sharing: true,
    }
}

pub struct TechnicalAgent {
    llm: Arc<dyn LlmProvider>,
}

impl TechnicalAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for TechnicalAgent {
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
