//! The protocol-enforcing stream sink.
//!
//! Every event of a response (orchestrator lifecycle, agent tokens, tool
//! context emissions) funnels through one [`StreamSink`]. The sink is the
//! single writer the protocol requires: an internal async mutex serializes
//! concurrent emitters, and a state machine drops protocol violations
//! (logged, never propagated): empty tokens, tool events without a prior
//! start, duplicate tool terminals, anything after the stream terminal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use sg_domain::error::{Error, Result};
use sg_domain::stream::{StreamEvent, StreamWriter};
use sg_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChannelWriter — the in-process transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A [`StreamWriter`] backed by a bounded tokio channel. Backpressure from
/// a slow consumer propagates to the producer through `send().await`.
pub struct ChannelWriter {
    tx: Mutex<Option<mpsc::Sender<StreamEvent>>>,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

#[async_trait::async_trait]
impl StreamWriter for ChannelWriter {
    async fn write(&self, event: StreamEvent) -> Result<()> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| Error::Other("stream consumer is gone".into())),
            None => Err(Error::Other("stream is closed".into())),
        }
    }

    async fn close(&self) {
        self.tx.lock().take();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StreamSink — single-writer protocol enforcement
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolPhase {
    Open,
    Closed,
}

#[derive(Default)]
struct SinkState {
    terminal_sent: bool,
    events_forwarded: u64,
    tools: HashMap<Uuid, ToolPhase>,
}

pub struct StreamSink {
    session_id: String,
    inner: Arc<dyn StreamWriter>,
    /// Serializes the validate-then-forward path across emitters.
    write_gate: tokio::sync::Mutex<()>,
    state: Mutex<SinkState>,
}

impl StreamSink {
    pub fn new(session_id: impl Into<String>, inner: Arc<dyn StreamWriter>) -> Self {
        Self {
            session_id: session_id.into(),
            inner,
            write_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(SinkState::default()),
        }
    }

    pub fn has_terminal(&self) -> bool {
        self.state.lock().terminal_sent
    }

    /// Validate the event against the protocol state. `None` means drop.
    fn admit(&self, event: StreamEvent) -> Option<StreamEvent> {
        let mut state = self.state.lock();

        if state.terminal_sent {
            tracing::warn!(
                session_id = %self.session_id,
                event = ?event,
                "event after stream terminal dropped"
            );
            return None;
        }

        match &event {
            StreamEvent::Token { content } if content.is_empty() => {
                tracing::debug!(session_id = %self.session_id, "empty token dropped");
                return None;
            }
            StreamEvent::ToolStart { tool_id, .. } => {
                if state.tools.contains_key(tool_id) {
                    tracing::warn!(%tool_id, "duplicate tool_start dropped");
                    return None;
                }
                state.tools.insert(*tool_id, ToolPhase::Open);
            }
            StreamEvent::ToolProgress { tool_id, .. } => {
                if state.tools.get(tool_id) != Some(&ToolPhase::Open) {
                    tracing::warn!(%tool_id, "tool_progress without open tool dropped");
                    return None;
                }
            }
            StreamEvent::ToolResult { tool_id, .. } | StreamEvent::ToolError { tool_id, .. } => {
                match state.tools.get(tool_id) {
                    Some(ToolPhase::Open) => {
                        state.tools.insert(*tool_id, ToolPhase::Closed);
                    }
                    Some(ToolPhase::Closed) => {
                        tracing::warn!(%tool_id, "second tool terminal dropped");
                        return None;
                    }
                    None => {
                        tracing::warn!(%tool_id, "tool terminal without start dropped");
                        return None;
                    }
                }
            }
            StreamEvent::Done { .. } | StreamEvent::Error { .. } => {
                state.terminal_sent = true;
            }
            _ => {}
        }

        state.events_forwarded += 1;
        Some(event)
    }
}

#[async_trait::async_trait]
impl StreamWriter for StreamSink {
    async fn write(&self, event: StreamEvent) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let Some(event) = self.admit(event) else {
            return Ok(());
        };

        let terminal = event.is_terminal();
        let terminal_kind = match &event {
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
            _ => "",
        };

        self.inner.write(event).await?;

        if terminal {
            TraceEvent::StreamClosed {
                session_id: self.session_id.clone(),
                terminal: terminal_kind.to_owned(),
                events: self.state.lock().events_forwarded,
            }
            .emit();
        }
        Ok(())
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
