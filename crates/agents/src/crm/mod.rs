//! The CRM agent.
//!
//! Distinguished by a structured query-understanding step: pattern matching
//! handles well-formed requests (accepted only at confidence ≥ 0.9), and a
//! single non-streaming LLM call translates everything else, which is what
//! makes typos survivable. The resolved intent drives tool invocations
//! through the tool context.

pub mod directory;
pub mod intent;

pub use directory::{CustomerDirectory, CustomerLookupTool, OrderStatusTool, PipelineSummaryTool};
pub use intent::CrmIntent;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sg_domain::capability::{AgentCapabilities, AgentInfo, AgentKind};
use sg_domain::error::Result;
use sg_llm::{ChatMessage, GenerateOptions, LlmProvider};
use sg_tools::{invoke, Tool, ToolContext, ToolOutcome};

use crate::{emit_text, Agent, AgentReply, AgentTurn};

pub const NAME: &str = "CrmAgent";

pub const KEYWORDS: &[&str] = &[
    "customer",
    "customers",
    "crm",
    "account",
    "order",
    "orders",
    "pipeline",
    "deal",
    "deals",
    "contact",
    "lead",
    "invoice",
];

pub fn capabilities() -> AgentCapabilities {
    AgentCapabilities {
        name: NAME.into(),
        version: "1.0.0".into(),
        kind: AgentKind::Individual,
        features: vec![
            "crm".into(),
            "customer-data".into(),
            "orders".into(),
        ],
        supported_modes: vec!["interactive".into()],
        supports_tools: true,
        supports_state_sharing: true,
    }
}

pub struct CrmAgent {
    llm: Arc<dyn LlmProvider>,
    directory: Arc<CustomerDirectory>,
}

impl CrmAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, directory: Arc<CustomerDirectory>) -> Self {
        Self { llm, directory }
    }

    /// Resolve the utterance to an intent: trusted pattern match first,
    /// LLM translation otherwise.
    async fn understand(&self, input: &str) -> CrmIntent {
        if let Some((intent, confidence)) = intent::parse_intent(input) {
            if confidence >= intent::PATTERN_CONFIDENCE_FLOOR {
                tracing::debug!(?intent, confidence, "crm intent from pattern");
                return intent;
            }
        }

        let prompt = intent::translation_prompt(input);
        match self
            .llm
            .generate(&[ChatMessage::user(prompt)], &GenerateOptions::default())
            .await
        {
            Ok(completion) => {
                let intent = intent::parse_llm_intent(&completion.text);
                tracing::debug!(?intent, "crm intent from model translation");
                intent
            }
            Err(e) => {
                tracing::warn!(error = %e, "crm intent translation failed");
                CrmIntent::Unknown
            }
        }
    }

    async fn run_tool(&self, tool: &dyn Tool, params: serde_json::Value, turn: &AgentTurn) -> ToolOutcome {
        let ctx = ToolContext::new(
            turn.session_id.clone(),
            NAME,
            turn.writer.clone(),
            turn.cancel.clone(),
            turn.tool_log.clone(),
        );
        invoke(tool, params, &ctx, turn.tool_timeout).await
    }

    fn render_reply(&self, intent: &CrmIntent, outcome: &ToolOutcome) -> String {
        if !outcome.success {
            return format!(
                "I couldn't complete that: {}.",
                outcome.error.as_deref().unwrap_or("unknown failure")
            );
        }
        let data = outcome.data.clone().unwrap_or(json!({}));

        match intent {
            CrmIntent::LookupCustomer { query } => {
                let matches = data["matches"].as_array().cloned().unwrap_or_default();
                if matches.is_empty() {
                    return format!("No customers match \"{query}\".");
                }
                let lines: Vec<String> = matches
                    .iter()
                    .map(|m| {
                        format!(
                            "- {} ({}) — {}, {}",
                            m["name"].as_str().unwrap_or("?"),
                            m["company"].as_str().unwrap_or("?"),
                            m["status"].as_str().unwrap_or("?"),
                            m["email"].as_str().unwrap_or("?"),
                        )
                    })
                    .collect();
                format!(
                    "Found {} customer(s) matching \"{query}\":\n{}",
                    matches.len(),
                    lines.join("\n")
                )
            }
            CrmIntent::OrderStatus { order_id } => format!(
                "Order {} is {} (total ${}).",
                order_id,
                data["status"].as_str().unwrap_or("in an unknown state"),
                data["total_usd"]
            ),
            CrmIntent::PipelineSummary => format!(
                "Pipeline: {} customers ({} active), {} open order(s) totalling ${}.",
                data["customers"],
                data["active_customers"],
                data["open_orders"],
                data["open_order_total_usd"]
            ),
            CrmIntent::Unknown => String::new(),
        }
    }
}

#[async_trait]
impl Agent for CrmAgent {
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
        let intent = self.understand(&turn.input).await;

        let reply = match &intent {
            CrmIntent::LookupCustomer { query } => {
                let tool = CustomerLookupTool::new(self.directory.clone());
                let outcome = self
                    .run_tool(&tool, json!({ "query": query }), &turn)
                    .await;
                self.render_reply(&intent, &outcome)
            }
            CrmIntent::OrderStatus { order_id } => {
                let tool = OrderStatusTool::new(self.directory.clone());
                let outcome = self
                    .run_tool(&tool, json!({ "order_id": order_id }), &turn)
                    .await;
                self.render_reply(&intent, &outcome)
            }
            CrmIntent::PipelineSummary => {
                let tool = PipelineSummaryTool::new(self.directory.clone());
                let outcome = self.run_tool(&tool, json!({}), &turn).await;
                self.render_reply(&intent, &outcome)
            }
            CrmIntent::Unknown => {
                "I handle customer lookups, order status, and pipeline summaries. \
Could you rephrase what you need?"
                    .to_owned()
            }
        };

        let content = emit_text(&reply, turn.writer.as_ref(), &turn.cancel).await?;
        Ok(AgentReply { content })
    }
}
