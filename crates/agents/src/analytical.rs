//! The analytical agent: data questions, statistics, comparisons.

use std::sync::Arc;

use async_trait::async_trait;

use sg_domain::capability::{AgentCapabilities, AgentInfo, AgentKind};
use sg_domain::error::Result;
use sg_llm::LlmProvider;

use crate::{build_prompt, stream_reply, Agent, AgentReply, AgentTurn};

pub const NAME: &str = "AnalyticalAgent";

pub const KEYWORDS: &[&str] = &[
    "analyze",
    "analysis",
    "statistics",
    "statistical",
    "data",
    "numbers",
    "metrics",
    "trend",
    "trends",
    "calculate",
    "compare",
    "correlation",
    "distribution",
];

const PERSONA: &str = "You are an analytical assistant. You reason about data, \
statistics, and quantitative questions. Be precise, show the steps that \
matter, and say so when the data is insufficient for a conclusion.";

pub fn capabilities() -> AgentCapabilities {
    AgentCapabilities {
        name: NAME.into(),
        version: "1.0.0".into(),
        kind: AgentKind::Individual,
        features: vec![
            "analysis".into(),
            "statistics".into(),
            "data-exploration".into(),
        ],
        supported_modes: vec!["interactive".into()],
        supports_tools: false,
        supports_state_sharing: true,
    }
}

pub struct AnalyticalAgent {
    llm: Arc<dyn LlmProvider>,
}

impl AnalyticalAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for AnalyticalAgent {
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
