//! `sg-agents` — the agent contract, registry, and the specialized agents.
//!
//! Every agent implements [`Agent`]: it takes one turn (input, session,
//! optional stream writer, cancel token), may invoke tools through a
//! [`sg_tools::ToolContext`], and returns the final reply. Agents that
//! stream guarantee the returned content equals the concatenation of the
//! `token` events they emitted.

pub mod analytical;
pub mod creative;
pub mod crm;
pub mod factory;
pub mod registry;
pub mod technical;

pub use factory::{AgentFactory, StandardAgentFactory};
pub use registry::AgentRegistry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use sg_domain::cancel::CancelToken;
use sg_domain::capability::{AgentCapabilities, AgentInfo};
use sg_domain::error::{Error, Result};
use sg_domain::stream::{StreamEvent, StreamWriter};
use sg_llm::{ChatMessage, GenerateOptions, LlmProvider};
use sg_sessions::ToolLog;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The agent contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything an agent receives for one turn.
pub struct AgentTurn {
    pub session_id: String,
    pub input: String,
    /// Brief recalled context for prompt augmentation; empty when recall
    /// produced nothing.
    pub memory_context: String,
    /// Present in streaming mode. Agents that do not stream ignore it.
    pub writer: Option<Arc<dyn StreamWriter>>,
    pub cancel: CancelToken,
    pub tool_log: Arc<ToolLog>,
    pub tool_timeout: Duration,
}

/// An agent's final reply for a turn.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub content: String,
}

/// The contract every agent satisfies.
#[async_trait]
pub trait Agent: Send + Sync {
    fn info(&self) -> AgentInfo;

    fn capabilities(&self) -> AgentCapabilities;

    /// Keyword affinities used by selection scoring.
    fn keywords(&self) -> &[&'static str] {
        &[]
    }

    /// Handle one turn. In streaming mode the returned content must equal
    /// the concatenation of the emitted `token` events.
    async fn process(&self, turn: AgentTurn) -> Result<AgentReply>;

    /// Release resources before the agent is dropped by its cache.
    async fn cleanup(&self) {}
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Agent").field("info", &self.info()).finish()
    }
}

/// A static snapshot of an agent's advertisement, used for selection.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub capabilities: AgentCapabilities,
    pub keywords: Vec<String>,
}

impl AgentProfile {
    pub fn name(&self) -> &str {
        &self.capabilities.name
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent provisioning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A live agent plus an optional usage guard (the cache uses the guard to
/// track in-flight turns before disposing an evicted agent).
pub struct AgentHandle {
    agent: Arc<dyn Agent>,
    _guard: Option<Box<dyn std::any::Any + Send + Sync>>,
}

impl AgentHandle {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            _guard: None,
        }
    }

    pub fn with_guard(
        agent: Arc<dyn Agent>,
        guard: Box<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        Self {
            agent,
            _guard: Some(guard),
        }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

/// How the orchestrator obtains an executable agent. The lazy cache
/// implements this; tests substitute their own.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    async fn agent_for(&self, kind: &str) -> Result<AgentHandle>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Assemble the prompt for a persona agent: system persona, recalled
/// context (when present), then the user input.
pub fn build_prompt(persona: &str, memory_context: &str, input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(3);
    messages.push(ChatMessage::system(persona));
    if !memory_context.is_empty() {
        messages.push(ChatMessage::system(format!(
            "Relevant context from earlier conversations:\n{memory_context}"
        )));
    }
    messages.push(ChatMessage::user(input));
    messages
}

/// Run the LLM and deliver the reply.
///
/// With a writer, chunks are forwarded as `token` events as they arrive and
/// the accumulated text is returned; without one, a single non-streaming
/// `generate` call is made. Cancellation stops iteration and surfaces as
/// `Error::Cancelled`.
pub async fn stream_reply(
    provider: &Arc<dyn LlmProvider>,
    messages: &[ChatMessage],
    writer: Option<&Arc<dyn StreamWriter>>,
    cancel: &CancelToken,
) -> Result<String> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let options = GenerateOptions::default();
    let Some(writer) = writer else {
        let completion = provider.generate(messages, &options).await?;
        return Ok(completion.text);
    };

    let mut stream = provider.stream(messages, &options).await?;
    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let chunk = chunk?;
        if chunk.content.is_empty() {
            continue;
        }
        content.push_str(&chunk.content);
        writer
            .write(StreamEvent::Token {
                content: chunk.content,
            })
            .await?;
    }
    Ok(content)
}

/// Stream pre-composed text as token events (used by agents whose reply is
/// assembled from tool output rather than an LLM stream). Returns the text.
pub async fn emit_text(
    text: &str,
    writer: Option<&Arc<dyn StreamWriter>>,
    cancel: &CancelToken,
) -> Result<String> {
    if let Some(writer) = writer {
        for token in sg_llm::scripted::tokenize(text) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            writer.write(StreamEvent::Token { content: token }).await?;
        }
    }
    Ok(text.to_owned())
}
