//! The request pipeline.
//!
//! One request: resolve the session, persist the user turn, recall memory
//! under its budget, select an agent, execute under the request timeout
//! (falling back per the configured strategy), finalize the assistant
//! message with unread gating, emit the terminal, then schedule the
//! fire-and-forget remember and the session bookkeeping. Streaming mode
//! additionally funnels every event through the protocol sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use sg_agents::{AgentReply, AgentTurn};
use sg_domain::cancel::CancelToken;
use sg_domain::config::FallbackStrategy;
use sg_domain::error::{Error, Result};
use sg_domain::message::{Message, MessageMetadata};
use sg_domain::routing::{AgentSelection, RoutingMetadata};
use sg_domain::session::AgentHistoryEntry;
use sg_domain::stream::{OrchestrationSummary, StreamEvent, StreamWriter};
use sg_domain::trace::TraceEvent;
use sg_memory::{recall_within, RecallScope, RecalledContext, TurnMemory};

use crate::cancel::CancelMap;
use crate::select::select_agent;
use crate::sink::{ChannelWriter, StreamSink};
use crate::state::Engine;

/// One request as received from the transport.
#[derive(Debug, Clone)]
pub struct RequestInput {
    pub session_id: String,
    pub user_input: String,
    /// The session the user is currently viewing; gates unread increments.
    pub caller_active_session_id: Option<String>,
    pub routing: Option<RoutingMetadata>,
}

impl RequestInput {
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_input: user_input.into(),
            caller_active_session_id: None,
            routing: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streaming mode: returns the event receiver immediately and runs the
/// pipeline in a spawned task. Exactly one terminal event arrives before
/// the channel closes.
pub fn stream_request(engine: Arc<Engine>, input: RequestInput) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel::<StreamEvent>(64);

    tokio::spawn(async move {
        let writer: Arc<dyn StreamWriter> = Arc::new(ChannelWriter::new(tx));
        let sink = Arc::new(StreamSink::new(input.session_id.clone(), writer));

        if sink.write(StreamEvent::Connected).await.is_err() {
            // Consumer went away before we started.
            return;
        }

        if let Err(e) = run_pipeline(&engine, &input, Some(&sink)).await {
            if !sink.has_terminal() {
                let message = match &e {
                    Error::Cancelled => "cancelled".to_owned(),
                    other => other.to_string(),
                };
                let _ = sink.write(StreamEvent::Error { message }).await;
            }
        }
        sink.close().await;
    });

    rx
}

/// Non-streaming mode: same phases minus event emission; returns the final
/// assistant message.
pub async fn run_request(engine: &Arc<Engine>, input: RequestInput) -> Result<Message> {
    run_pipeline(engine, &input, None).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Removes the session's cancel token on every exit path.
struct CancelCleanup {
    map: Arc<CancelMap>,
    session_id: String,
}

impl Drop for CancelCleanup {
    fn drop(&mut self) {
        self.map.remove(&self.session_id);
    }
}

async fn emit(sink: Option<&Arc<StreamSink>>, event: StreamEvent) {
    if let Some(sink) = sink {
        if let Err(e) = sink.write(event).await {
            tracing::debug!(error = %e, "stream consumer dropped mid-request");
        }
    }
}

async fn emit_error(sink: Option<&Arc<StreamSink>>, message: impl Into<String>) {
    emit(
        sink,
        StreamEvent::Error {
            message: message.into(),
        },
    )
    .await;
}

async fn run_pipeline(
    engine: &Arc<Engine>,
    input: &RequestInput,
    sink: Option<&Arc<StreamSink>>,
) -> Result<Message> {
    let started = Instant::now();
    let session_id = input.session_id.clone();

    if !engine.is_accepting() {
        emit_error(sink, "engine is shutting down").await;
        return Err(Error::ShuttingDown);
    }

    // One turn per session at a time.
    let _permit = engine.session_locks.acquire(&session_id).await?;

    // 1. Resolve.
    let (session, is_new) = match engine.sessions.get_or_create(&session_id) {
        Ok(resolved) => resolved,
        Err(e) => {
            emit_error(sink, e.to_string()).await;
            return Err(e);
        }
    };
    if !is_new {
        TraceEvent::SessionResolved {
            session_id: session_id.clone(),
            is_new: false,
        }
        .emit();
    }

    let cancel = engine.cancel_map.register(&session_id);
    let _cancel_cleanup = CancelCleanup {
        map: engine.cancel_map.clone(),
        session_id: session_id.clone(),
    };

    // 2. Persist the user turn.
    let mut user_msg = Message::user(&input.user_input);
    if let Some(routing) = &input.routing {
        user_msg.metadata = MessageMetadata::from_routing(routing);
    }
    if let Err(e) = engine.sessions.append_message(&session_id, user_msg) {
        emit_error(sink, e.to_string()).await;
        return Err(e);
    }

    // 3. Recall under the budget.
    let scope = if session.preferences.cross_session_memory {
        RecallScope::CrossSession
    } else {
        RecallScope::Session
    };
    let mut recalled = recall_within(
        &engine.memory,
        &session_id,
        &input.user_input,
        scope,
        Duration::from_millis(engine.config.memory.recall_budget_ms),
    )
    .await;

    // Shared session state: the most recent handoff summary travels with
    // the turn so the receiving agent has the conversation thread.
    if engine.config.orchestrator.enable_state_sharing {
        if let Some(handoff) = session.handoffs.last() {
            if !handoff.conversation_summary.is_empty() {
                recalled.entries.insert(
                    0,
                    format!(
                        "Handed off from {}: {}",
                        handoff.from_agent, handoff.conversation_summary
                    ),
                );
            }
        }
    }

    // 4. Select.
    let profiles = engine.catalog();
    let Some(selection) = select_agent(
        &input.user_input,
        &session,
        input.routing.as_ref(),
        &profiles,
    ) else {
        emit_error(sink, "no agents registered").await;
        return Err(Error::AgentNotFound("no agents registered".into()));
    };
    TraceEvent::AgentSelected {
        session_id: session_id.clone(),
        agent: selection.agent.clone(),
        confidence: selection.confidence,
        reason: selection.reason.clone(),
    }
    .emit();

    // 5. Open the stream.
    emit(
        sink,
        StreamEvent::Start {
            agent: Some(selection.agent.clone()),
        },
    )
    .await;

    // 6. Execute with fallback.
    let (agent_name, reply) =
        match execute_with_fallback(engine, &selection, input, &recalled, sink, &cancel).await {
            Ok(done) => done,
            Err(e) => {
                let message = match &e {
                    Error::Cancelled => "cancelled".to_owned(),
                    other => other.to_string(),
                };
                emit_error(sink, message).await;
                return Err(e);
            }
        };

    // 7. Finalize: the assistant append and the unread increment are one
    //    atomic store operation.
    let assistant = Message::assistant(&reply.content, &agent_name);
    let seq = match engine.sessions.append_assistant(
        &session_id,
        assistant.clone(),
        input.caller_active_session_id.as_deref(),
    ) {
        Ok(seq) => seq,
        Err(e) => {
            emit_error(sink, e.to_string()).await;
            return Err(e);
        }
    };
    let mut assistant = assistant;
    assistant.seq = seq;

    // 8. Terminal.
    let summary = OrchestrationSummary {
        confidence: selection.confidence,
        reason: selection.reason.clone(),
        execution_time_ms: started.elapsed().as_millis() as u64,
        agent_lock_used: selection.reason == "agent-lock",
        forced_by_command: selection.reason == "forced",
    };
    emit(
        sink,
        StreamEvent::Done {
            agent: Some(agent_name.clone()),
            summary,
        },
    )
    .await;

    // 9. Fire-and-forget remember, only after a successful append + done.
    engine.remember_queue.submit(TurnMemory::new(
        &session_id,
        &input.user_input,
        &reply.content,
        Some(agent_name.clone()),
    ));

    // 10. Session bookkeeping. Failures here are logged, not surfaced: the
    //     reply is already delivered.
    if let Err(e) = engine.sessions.update_preferences(
        &session_id,
        &sg_domain::session::PreferencesPatch {
            last_agent_used: Some(agent_name.clone()),
            ..Default::default()
        },
    ) {
        tracing::warn!(error = %e, "failed to record last agent used");
    }
    if let Err(e) = engine.sessions.set_active_agent(&session_id, &agent_name) {
        tracing::warn!(error = %e, "failed to update active agent");
    }
    if let Err(e) = engine.sessions.append_agent_history(
        &session_id,
        AgentHistoryEntry {
            agent_name: agent_name.clone(),
            timestamp: Utc::now(),
            confidence: selection.confidence,
            reason: selection.reason.clone(),
            handoff_from: None,
        },
    ) {
        tracing::warn!(error = %e, "failed to append agent history");
    }

    Ok(assistant)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution & fallback
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Transient external failures and missing registrations are worth trying
/// a fallback agent; store and protocol failures are not.
fn worth_fallback(e: &Error) -> bool {
    e.is_transient() || matches!(e, Error::AgentNotFound(_))
}

async fn execute_with_fallback(
    engine: &Arc<Engine>,
    selection: &AgentSelection,
    input: &RequestInput,
    recalled: &RecalledContext,
    sink: Option<&Arc<StreamSink>>,
    cancel: &CancelToken,
) -> Result<(String, AgentReply)> {
    let mut candidates = vec![selection.agent.clone()];
    for fallback in &selection.fallback_agents {
        if !candidates.contains(fallback) {
            candidates.push(fallback.clone());
        }
    }

    match engine.config.orchestrator.fallback_strategy {
        FallbackStrategy::BestEffort => {
            let reply = attempt(engine, &candidates[0], input, recalled, sink, cancel, true).await?;
            Ok((candidates[0].clone(), reply))
        }

        FallbackStrategy::Sequential => {
            let mut last_err: Option<Error> = None;
            for (i, name) in candidates.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if i > 0 {
                    emit(
                        sink,
                        StreamEvent::Status {
                            status: "fallback".into(),
                            message: format!("retrying with {name}"),
                            metadata: None,
                        },
                    )
                    .await;
                }
                match attempt(engine, name, input, recalled, sink, cancel, true).await {
                    Ok(reply) => return Ok((name.clone(), reply)),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) if !worth_fallback(&e) => return Err(e),
                    Err(e) => {
                        tracing::warn!(agent = %name, error = %e, "agent attempt failed");
                        last_err = Some(e);
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| Error::AgentNotFound("no candidates".into())))
        }

        FallbackStrategy::Parallel => {
            // Race without streaming (one winner, one voice on the stream);
            // the winner's content is emitted as tokens afterwards.
            let mut tokens = Vec::with_capacity(candidates.len());
            let mut futures = Vec::with_capacity(candidates.len());
            for name in &candidates {
                let attempt_cancel = cancel.child();
                tokens.push(attempt_cancel.clone());
                let engine = engine.clone();
                let name = name.clone();
                let input = input.clone();
                let recalled = recalled.clone();
                futures.push(Box::pin(async move {
                    let result = attempt_inner(
                        &engine,
                        &name,
                        &input,
                        &recalled,
                        None,
                        attempt_cancel,
                    )
                    .await;
                    (name, result)
                }));
            }

            let mut remaining = futures;
            let mut last_err: Option<Error> = None;
            while !remaining.is_empty() {
                let ((name, result), _idx, rest) =
                    futures_util::future::select_all(remaining).await;
                remaining = rest;
                match result {
                    Ok(reply) => {
                        for token in &tokens {
                            token.cancel();
                        }
                        if let Some(sink) = sink {
                            let writer: Arc<dyn StreamWriter> = sink.clone();
                            let _ =
                                sg_agents::emit_text(&reply.content, Some(&writer), cancel).await;
                        }
                        return Ok((name, reply));
                    }
                    Err(e) => {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        tracing::warn!(agent = %name, error = %e, "parallel attempt failed");
                        last_err = Some(e);
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| Error::AgentNotFound("no candidates".into())))
        }
    }
}

/// One execution attempt with its own child cancel token (so the attempt
/// timeout cancels this attempt, not the request).
async fn attempt(
    engine: &Arc<Engine>,
    agent_name: &str,
    input: &RequestInput,
    recalled: &RecalledContext,
    sink: Option<&Arc<StreamSink>>,
    cancel: &CancelToken,
    streaming: bool,
) -> Result<AgentReply> {
    let writer: Option<Arc<dyn StreamWriter>> = match (streaming, sink) {
        (true, Some(sink)) => {
            let writer: Arc<dyn StreamWriter> = sink.clone();
            Some(writer)
        }
        _ => None,
    };
    attempt_inner(engine, agent_name, input, recalled, writer, cancel.child()).await
}

async fn attempt_inner(
    engine: &Arc<Engine>,
    agent_name: &str,
    input: &RequestInput,
    recalled: &RecalledContext,
    writer: Option<Arc<dyn StreamWriter>>,
    attempt_cancel: CancelToken,
) -> Result<AgentReply> {
    use sg_agents::AgentProvider;

    let handle = engine.agents.agent_for(agent_name).await?;

    let turn = AgentTurn {
        session_id: input.session_id.clone(),
        input: input.user_input.clone(),
        memory_context: recalled.brief(),
        writer,
        cancel: attempt_cancel.clone(),
        tool_log: engine.sessions.tool_log(),
        tool_timeout: Duration::from_millis(engine.config.orchestrator.tool_timeout_ms),
    };

    let timeout = Duration::from_millis(engine.config.orchestrator.request_timeout_ms);
    match tokio::time::timeout(timeout, handle.agent().process(turn)).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => {
            if attempt_cancel.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                Err(e)
            }
        }
        Err(_) => {
            attempt_cancel.cancel();
            Err(Error::Timeout(format!(
                "agent {agent_name} exceeded {} ms",
                timeout.as_millis()
            )))
        }
    }
}
