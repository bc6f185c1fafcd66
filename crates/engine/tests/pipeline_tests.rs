//! End-to-end pipeline tests: one engine, real session store on a temp
//! dir, scripted LLM, and assertions over the full event sequence.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use sg_agents::{
    Agent, AgentFactory, AgentProfile, AgentReply, AgentTurn, StandardAgentFactory,
};
use sg_domain::capability::{AgentCapabilities, AgentInfo, AgentKind};
use sg_domain::config::Config;
use sg_domain::error::{Error, Result};
use sg_domain::message::MessageKind;
use sg_domain::routing::RoutingMetadata;
use sg_domain::stream::StreamEvent;
use sg_engine::{run_request, stream_request, Engine, HandoffRequest, RequestInput};
use sg_llm::{LlmProvider, ScriptedProvider};
use sg_memory::{MemoryProvider, NullMemory, RecallScope, RecalledContext, TurnMemory};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn test_config(state_path: &Path) -> Config {
    let mut config = Config::default();
    config.sessions.state_path = state_path.to_path_buf();
    config.memory.recall_budget_ms = 200;
    config
}

fn scripted_engine(dir: &Path, replies: &[&str]) -> Arc<Engine> {
    let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::with_replies(replies.to_vec()));
    Engine::start(test_config(dir), llm).unwrap()
}

async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn tokens_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

fn terminal_of(events: &[StreamEvent]) -> &StreamEvent {
    events.last().expect("stream produced no events")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario: forced routing via slash command
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn forced_routing_streams_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["a creative hello"]);

    let mut input = RequestInput::new("s1", "hello world");
    input.routing = Some(RoutingMetadata::forced("CreativeAgent", "creative"));

    let events = collect(stream_request(engine.clone(), input)).await;

    assert!(matches!(events[0], StreamEvent::Connected));
    assert!(
        matches!(&events[1], StreamEvent::Start { agent: Some(a) } if a == "CreativeAgent")
    );
    assert!(!tokens_of(&events).is_empty());
    match terminal_of(&events) {
        StreamEvent::Done { agent, summary } => {
            assert_eq!(agent.as_deref(), Some("CreativeAgent"));
            assert!((summary.confidence - 1.0).abs() < f32::EPSILON);
            assert!(summary.forced_by_command);
            assert!(!summary.agent_lock_used);
        }
        other => panic!("expected Done terminal, got {other:?}"),
    }

    // One user and one assistant message in the log.
    let page = engine.sessions.read_messages("s1", 0, 10).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.messages[0].kind, MessageKind::User);
    assert_eq!(page.messages[1].kind, MessageKind::Assistant);
    assert_eq!(page.messages[1].content, "a creative hello");

    let meta = engine.sessions.get_session("s1").unwrap();
    assert_eq!(meta.preferences.last_agent_used.as_deref(), Some("CreativeAgent"));
    assert_eq!(meta.active_agent.as_deref(), Some("CreativeAgent"));

    // The user turn carries the slash-command record.
    let record = page.messages[0].metadata.slash_command.as_ref().unwrap();
    assert_eq!(record.command, "creative");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming invariants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn token_concatenation_equals_final_content() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["every token counted here"]);

    let mut input = RequestInput::new("s1", "anything at all");
    input.routing = Some(RoutingMetadata::forced("TechnicalAgent", "technical"));
    let events = collect(stream_request(engine.clone(), input)).await;

    let streamed = tokens_of(&events);
    let stored = engine.sessions.read_messages("s1", 0, 10).unwrap();
    assert_eq!(streamed, stored.messages[1].content);
    assert_eq!(streamed, "every token counted here");
}

#[tokio::test]
async fn exactly_one_terminal_and_it_is_last() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["short"]);

    let events = collect(stream_request(
        engine,
        RequestInput::new("s1", "write a story"),
    ))
    .await;

    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(terminal_of(&events).is_terminal());
}

#[tokio::test]
async fn empty_input_still_gets_a_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &[""]);

    let events = collect(stream_request(engine, RequestInput::new("s1", ""))).await;
    assert!(tokens_of(&events).is_empty());
    assert!(matches!(terminal_of(&events), StreamEvent::Done { .. }));
}

#[tokio::test]
async fn non_streaming_mode_returns_the_message() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["direct answer"]);

    let mut input = RequestInput::new("s1", "hello");
    input.routing = Some(RoutingMetadata::forced("AnalyticalAgent", "analytical"));
    let message = run_request(&engine, input).await.unwrap();

    assert_eq!(message.content, "direct answer");
    assert_eq!(message.seq, 2);
    assert_eq!(message.agent.as_deref(), Some("AnalyticalAgent"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario: unread increment on background session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn background_session_gains_unread_and_mark_read_clears() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["reply into b"]);

    let mut input = RequestInput::new("b", "hello over there");
    input.caller_active_session_id = Some("a".into());
    let events = collect(stream_request(engine.clone(), input)).await;
    assert!(matches!(terminal_of(&events), StreamEvent::Done { .. }));

    assert_eq!(engine.sessions.get_session("b").unwrap().unread_count, 1);

    let marked = engine.sessions.mark_read("b").unwrap();
    assert_eq!(marked.unread_count, 0);
    assert!(marked.last_read_at.is_some());

    // Foreground replies never increment.
    let mut input = RequestInput::new("b", "again");
    input.caller_active_session_id = Some("b".into());
    collect(stream_request(engine.clone(), input)).await;
    assert_eq!(engine.sessions.get_session("b").unwrap().unread_count, 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario: memory recall timeout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SlowRecallMemory {
    delay: Duration,
    remembered: Mutex<Vec<TurnMemory>>,
}

#[async_trait]
impl MemoryProvider for SlowRecallMemory {
    async fn recall(
        &self,
        _session_id: &str,
        _user_input: &str,
        _scope: RecallScope,
    ) -> Result<RecalledContext> {
        tokio::time::sleep(self.delay).await;
        Ok(RecalledContext {
            entries: vec!["too late to matter".into()],
        })
    }
    async fn remember(&self, turn: &TurnMemory) -> Result<()> {
        self.remembered.lock().push(turn.clone());
        Ok(())
    }
    async fn forget_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
    async fn health(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

#[tokio::test]
async fn recall_timeout_does_not_block_the_reply() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.memory.recall_budget_ms = 100;

    let memory = Arc::new(SlowRecallMemory {
        delay: Duration::from_millis(500),
        remembered: Mutex::new(Vec::new()),
    });
    let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::with_replies(["proceeded"]));
    let factory: Arc<dyn AgentFactory> = Arc::new(StandardAgentFactory::new(llm));
    let engine = Engine::start_with(config, memory.clone(), factory).unwrap();

    let started = std::time::Instant::now();
    let events = collect(stream_request(
        engine.clone(),
        RequestInput::new("s1", "do you remember me"),
    ))
    .await;

    assert!(matches!(terminal_of(&events), StreamEvent::Done { .. }));
    assert!(started.elapsed() < Duration::from_millis(450));

    // Remember was still scheduled and drains through the queue.
    for _ in 0..50 {
        if !memory.remembered.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let remembered = memory.remembered.lock();
    assert_eq!(remembered.len(), 1);
    assert_eq!(remembered[0].session_id, "s1");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario: tool progress then failure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn failing_tool_emits_exactly_one_tool_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &[]);

    let mut input = RequestInput::new("s1", "track order SO-0000");
    input.routing = Some(RoutingMetadata::forced("CrmAgent", "crm"));
    let events = collect(stream_request(engine, input)).await;

    let starts = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::ToolStart { .. }))
        .count();
    let errors = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::ToolError { .. }))
        .count();
    let results = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::ToolResult { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(errors, 1);
    assert_eq!(results, 0);
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::ToolProgress { .. })));
    // The stream still ends with done: the agent reported the failure in prose.
    assert!(matches!(terminal_of(&events), StreamEvent::Done { .. }));
}

#[tokio::test]
async fn successful_tool_events_are_well_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &[]);

    let mut input = RequestInput::new("s1", "status of order SO-1042");
    input.routing = Some(RoutingMetadata::forced("CrmAgent", "crm"));
    let events = collect(stream_request(engine.clone(), input)).await;

    let start_idx = events
        .iter()
        .position(|e| matches!(e, StreamEvent::ToolStart { .. }))
        .unwrap();
    let result_idx = events
        .iter()
        .position(|e| matches!(e, StreamEvent::ToolResult { .. }))
        .unwrap();
    assert!(start_idx < result_idx);

    // The tool log recorded the full lifecycle.
    let records = engine.sessions.tool_log().read_all("s1").unwrap();
    assert!(records.len() >= 2);
    assert_eq!(records.last().unwrap().status, sg_domain::tool::ToolStatus::Completed);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct DrippingAgent;

#[async_trait]
impl Agent for DrippingAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: "DrippingAgent".into(),
            version: "1.0.0".into(),
            kind: AgentKind::Individual,
        }
    }
    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: "DrippingAgent".into(),
            version: "1.0.0".into(),
            kind: AgentKind::Individual,
            features: vec![],
            supported_modes: vec!["interactive".into()],
            supports_tools: false,
            supports_state_sharing: false,
        }
    }
    async fn process(&self, turn: AgentTurn) -> Result<AgentReply> {
        let mut content = String::new();
        for i in 0..100 {
            if turn.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let token = format!("t{i} ");
            if let Some(writer) = &turn.writer {
                writer
                    .write(StreamEvent::Token {
                        content: token.clone(),
                    })
                    .await?;
            }
            content.push_str(&token);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(AgentReply { content })
    }
}

struct DrippingFactory;

#[async_trait]
impl AgentFactory for DrippingFactory {
    fn profiles(&self) -> Vec<AgentProfile> {
        vec![AgentProfile {
            capabilities: AgentCapabilities {
                name: "DrippingAgent".into(),
                version: "1.0.0".into(),
                kind: AgentKind::Individual,
                features: vec![],
                supported_modes: vec!["interactive".into()],
                supports_tools: false,
                supports_state_sharing: false,
            },
            keywords: vec![],
        }]
    }
    async fn build(&self, kind: &str) -> Result<Arc<dyn Agent>> {
        match kind {
            "DrippingAgent" => Ok(Arc::new(DrippingAgent)),
            other => Err(Error::AgentNotFound(other.to_owned())),
        }
    }
}

#[tokio::test]
async fn cancellation_stops_tokens_and_emits_error_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::start_with(
        test_config(dir.path()),
        Arc::new(NullMemory),
        Arc::new(DrippingFactory),
    )
    .unwrap();

    let rx = stream_request(engine.clone(), RequestInput::new("s1", "drip it"));

    let engine2 = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(engine2.cancel_request("s1"));
    });

    let events = collect(rx).await;
    match terminal_of(&events) {
        StreamEvent::Error { message } => assert_eq!(message, "cancelled"),
        other => panic!("expected Error terminal, got {other:?}"),
    }
    // Far fewer than the 100 tokens a full run would emit.
    let token_count = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Token { .. }))
        .count();
    assert!(token_count < 100);
    // Nothing after the terminal.
    assert!(events.iter().rev().skip(1).all(|e| !e.is_terminal()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Empty registry & shutdown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct EmptyFactory;

#[async_trait]
impl AgentFactory for EmptyFactory {
    fn profiles(&self) -> Vec<AgentProfile> {
        Vec::new()
    }
    async fn build(&self, kind: &str) -> Result<Arc<dyn Agent>> {
        Err(Error::AgentNotFound(kind.to_owned()))
    }
}

#[tokio::test]
async fn zero_agents_produces_synthetic_error_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::start_with(
        test_config(dir.path()),
        Arc::new(NullMemory),
        Arc::new(EmptyFactory),
    )
    .unwrap();

    let events = collect(stream_request(engine, RequestInput::new("s1", "anyone home"))).await;
    match terminal_of(&events) {
        StreamEvent::Error { message } => assert!(message.contains("no agents")),
        other => panic!("expected Error terminal, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_rejects_new_requests() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &[]);

    engine.shutdown(Duration::from_millis(500)).await;

    let err = run_request(&engine, RequestInput::new("s1", "too late"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fallback strategies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct NamedAgent {
    name: &'static str,
    fail: bool,
}

#[async_trait]
impl Agent for NamedAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.into(),
            version: "1.0.0".into(),
            kind: AgentKind::Individual,
        }
    }
    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: self.name.into(),
            version: "1.0.0".into(),
            kind: AgentKind::Individual,
            features: vec![],
            supported_modes: vec!["interactive".into()],
            supports_tools: false,
            supports_state_sharing: false,
        }
    }
    fn keywords(&self) -> &[&'static str] {
        &["zeta"]
    }
    async fn process(&self, turn: AgentTurn) -> Result<AgentReply> {
        if self.fail {
            return Err(Error::Provider {
                provider: self.name.into(),
                message: "upstream unavailable".into(),
            });
        }
        let content = format!("{} answered", self.name);
        if let Some(writer) = &turn.writer {
            writer
                .write(StreamEvent::Token {
                    content: content.clone(),
                })
                .await?;
        }
        Ok(AgentReply { content })
    }
}

/// `AlphaAgent` fails with a transient error; `BetaAgent` succeeds. Both
/// match the keyword "zeta", so Alpha wins the alphabetic tie-break with
/// Beta as its fallback.
struct FlakyFactory;

#[async_trait]
impl AgentFactory for FlakyFactory {
    fn profiles(&self) -> Vec<AgentProfile> {
        ["AlphaAgent", "BetaAgent"]
            .iter()
            .map(|name| AgentProfile {
                capabilities: AgentCapabilities {
                    name: (*name).into(),
                    version: "1.0.0".into(),
                    kind: AgentKind::Individual,
                    features: vec![],
                    supported_modes: vec!["interactive".into()],
                    supports_tools: false,
                    supports_state_sharing: false,
                },
                keywords: vec!["zeta".into()],
            })
            .collect()
    }
    async fn build(&self, kind: &str) -> Result<Arc<dyn Agent>> {
        match kind {
            "AlphaAgent" => Ok(Arc::new(NamedAgent {
                name: "AlphaAgent",
                fail: true,
            })),
            "BetaAgent" => Ok(Arc::new(NamedAgent {
                name: "BetaAgent",
                fail: false,
            })),
            other => Err(Error::AgentNotFound(other.to_owned())),
        }
    }
}

#[tokio::test]
async fn sequential_fallback_recovers_with_status_event() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::start_with(
        test_config(dir.path()),
        Arc::new(NullMemory),
        Arc::new(FlakyFactory),
    )
    .unwrap();

    let events = collect(stream_request(engine, RequestInput::new("s1", "zeta please"))).await;

    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Status { status, .. } if status == "fallback")));
    match terminal_of(&events) {
        StreamEvent::Done { agent, .. } => assert_eq!(agent.as_deref(), Some("BetaAgent")),
        other => panic!("expected Done terminal, got {other:?}"),
    }
    assert!(tokens_of(&events).contains("BetaAgent answered"));
}

#[tokio::test]
async fn parallel_fallback_takes_first_success() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.orchestrator.fallback_strategy = sg_domain::config::FallbackStrategy::Parallel;
    let engine = Engine::start_with(config, Arc::new(NullMemory), Arc::new(FlakyFactory)).unwrap();

    let events = collect(stream_request(engine.clone(), RequestInput::new("s1", "zeta please"))).await;

    match terminal_of(&events) {
        StreamEvent::Done { agent, .. } => assert_eq!(agent.as_deref(), Some("BetaAgent")),
        other => panic!("expected Done terminal, got {other:?}"),
    }
    let stored = engine.sessions.read_messages("s1", 0, 10).unwrap();
    assert_eq!(stored.messages[1].content, "BetaAgent answered");
    // Streamed tokens match the stored reply even in parallel mode.
    assert_eq!(tokens_of(&events), "BetaAgent answered");
}

#[tokio::test]
async fn best_effort_surfaces_the_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.orchestrator.fallback_strategy = sg_domain::config::FallbackStrategy::BestEffort;
    let engine = Engine::start_with(config, Arc::new(NullMemory), Arc::new(FlakyFactory)).unwrap();

    let events = collect(stream_request(engine, RequestInput::new("s1", "zeta please"))).await;
    match terminal_of(&events) {
        StreamEvent::Error { message } => assert!(message.contains("AlphaAgent")),
        other => panic!("expected Error terminal, got {other:?}"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario: handoff
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn handoff_rewrites_active_agent_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["hello from creative"]);

    // Run a turn so the session exists with CreativeAgent active.
    let mut input = RequestInput::new("s1", "hello");
    input.routing = Some(RoutingMetadata::forced("CreativeAgent", "creative"));
    collect(stream_request(engine.clone(), input)).await;

    let outcome = engine
        .handoff(
            "CreativeAgent",
            "TechnicalAgent",
            HandoffRequest {
                session_id: "s1".into(),
                reason: "user pasted a stack trace".into(),
                conversation_summary: "greeting, then an error report".into(),
                user_intent: "debugging".into(),
            },
        )
        .await;
    assert!(outcome.ok);
    assert_eq!(outcome.new_agent, "TechnicalAgent");
    assert!(outcome.transition_message.is_some());

    let meta = engine.sessions.get_session("s1").unwrap();
    assert_eq!(meta.active_agent.as_deref(), Some("TechnicalAgent"));
    assert_eq!(meta.previous_agent.as_deref(), Some("CreativeAgent"));
    let last = meta.agent_history.last().unwrap();
    assert_eq!(last.agent_name, "TechnicalAgent");
    assert_eq!(last.handoff_from.as_deref(), Some("CreativeAgent"));

    // Unknown target changes nothing.
    let outcome = engine
        .handoff(
            "TechnicalAgent",
            "GhostAgent",
            HandoffRequest {
                session_id: "s1".into(),
                reason: String::new(),
                conversation_summary: String::new(),
                user_intent: String::new(),
            },
        )
        .await;
    assert!(!outcome.ok);
    assert_eq!(
        engine
            .sessions
            .get_session("s1")
            .unwrap()
            .active_agent
            .as_deref(),
        Some("TechnicalAgent")
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keyword routing with continuity (end to end)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn continuity_bonus_shows_in_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let engine = scripted_engine(dir.path(), &["first analysis", "second analysis"]);

    // First turn establishes last_agent_used = AnalyticalAgent.
    collect(stream_request(
        engine.clone(),
        RequestInput::new("s1", "analyze these statistics"),
    ))
    .await;

    let events = collect(stream_request(
        engine.clone(),
        RequestInput::new("s1", "analyze these statistics"),
    ))
    .await;
    match terminal_of(&events) {
        StreamEvent::Done { agent, summary } => {
            assert_eq!(agent.as_deref(), Some("AnalyticalAgent"));
            assert!(summary.reason.contains("continuity"));
            assert!((summary.confidence - 0.95).abs() < 1e-6);
        }
        other => panic!("expected Done terminal, got {other:?}"),
    }
}
