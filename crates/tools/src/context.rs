//! The tool invocation context.
//!
//! Binds an executing tool to its stream, session, and cancellation token.
//! Guarantees exactly one terminal per tool id: a tool that returns without
//! emitting one has `error("tool returned without terminal")` synthesized;
//! when the cancel token fires, the context stops accepting emissions and
//! synthesizes `error("cancelled")` for every in-flight id. All lifecycle
//! transitions are written to the tool log even when no stream writer is
//! attached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use sg_domain::cancel::CancelToken;
use sg_domain::error::{Error, Result};
use sg_domain::stream::{StreamEvent, StreamWriter};
use sg_domain::tool::{ToolExecutionRecord, ToolStatus};
use sg_domain::trace::TraceEvent;
use sg_sessions::ToolLog;

struct InflightTool {
    tool_name: String,
    parameters: Value,
    started_at: DateTime<Utc>,
    progressed: bool,
}

pub struct ToolContext {
    session_id: String,
    agent_name: String,
    writer: Option<Arc<dyn StreamWriter>>,
    cancel: CancelToken,
    tool_log: Arc<ToolLog>,
    inflight: Mutex<HashMap<Uuid, InflightTool>>,
}

impl ToolContext {
    pub fn new(
        session_id: impl Into<String>,
        agent_name: impl Into<String>,
        writer: Option<Arc<dyn StreamWriter>>,
        cancel: CancelToken,
        tool_log: Arc<ToolLog>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agent_name: agent_name.into(),
            writer,
            cancel,
            tool_log,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    // ── emitters ─────────────────────────────────────────────────────

    /// Begin a tool invocation. Returns the new tool id.
    pub async fn start(&self, tool_name: &str, parameters: Value) -> Result<Uuid> {
        if self.cancel.is_cancelled() {
            self.cancel_inflight().await;
            return Err(Error::Cancelled);
        }

        let tool_id = Uuid::new_v4();
        let record = ToolExecutionRecord::starting(
            tool_id,
            tool_name,
            &self.agent_name,
            &self.session_id,
            parameters.clone(),
        );
        let started_at = record.started_at;
        self.append_log(record, "starting");

        self.inflight.lock().insert(
            tool_id,
            InflightTool {
                tool_name: tool_name.to_owned(),
                parameters: parameters.clone(),
                started_at,
                progressed: false,
            },
        );

        self.emit(StreamEvent::ToolStart {
            tool_id,
            tool_name: tool_name.to_owned(),
            agent_name: self.agent_name.clone(),
            parameters,
        })
        .await;

        Ok(tool_id)
    }

    /// Report intermediate progress. The first progress transitions the
    /// record from starting to running.
    pub async fn progress(&self, tool_id: Uuid, text: &str, metadata: Option<Value>) {
        if self.cancel.is_cancelled() {
            self.cancel_inflight().await;
            return;
        }

        let first = {
            let mut inflight = self.inflight.lock();
            match inflight.get_mut(&tool_id) {
                Some(tool) => {
                    let first = !tool.progressed;
                    tool.progressed = true;
                    Some((first, self.starting_record(tool_id, tool)))
                }
                None => None,
            }
        };

        let Some((first, record)) = first else {
            tracing::warn!(%tool_id, "progress for unknown tool id dropped");
            return;
        };

        if first {
            self.append_log(record.running(), "running");
        }

        self.emit(StreamEvent::ToolProgress {
            tool_id,
            progress: text.to_owned(),
            metadata,
        })
        .await;
    }

    /// Successful terminal for `tool_id`.
    pub async fn result(&self, tool_id: Uuid, value: Value) {
        if self.cancel.is_cancelled() {
            self.cancel_inflight().await;
            return;
        }
        let Some(record) = self.take_inflight(tool_id) else {
            tracing::warn!(%tool_id, "result for unknown or finished tool id dropped");
            return;
        };
        self.append_log(record.completed(value.clone()), "completed");
        self.emit(StreamEvent::ToolResult {
            tool_id,
            result: value,
        })
        .await;
    }

    /// Failure terminal for `tool_id`.
    pub async fn error(&self, tool_id: Uuid, message: &str) {
        if self.cancel.is_cancelled() {
            self.cancel_inflight().await;
            return;
        }
        let Some(record) = self.take_inflight(tool_id) else {
            tracing::warn!(%tool_id, "error for unknown or finished tool id dropped");
            return;
        };
        self.append_log(record.failed(message), "failed");
        self.emit(StreamEvent::ToolError {
            tool_id,
            error: message.to_owned(),
        })
        .await;
    }

    // ── terminal synthesis ───────────────────────────────────────────

    /// Called after a tool's `execute` returns: any id still in flight gets
    /// a synthesized failure terminal.
    pub async fn finish(&self) {
        self.synthesize_errors("tool returned without terminal").await;
    }

    /// Called when the cancel token fires: in-flight ids terminate as
    /// `error("cancelled")`.
    pub async fn cancel_inflight(&self) {
        self.synthesize_errors("cancelled").await;
    }

    async fn synthesize_errors(&self, message: &str) {
        let orphans: Vec<(Uuid, ToolExecutionRecord)> = {
            let mut inflight = self.inflight.lock();
            inflight
                .drain()
                .map(|(id, tool)| {
                    let record = ToolExecutionRecord {
                        seq: 0,
                        tool_id: id,
                        tool_name: tool.tool_name.clone(),
                        agent_name: self.agent_name.clone(),
                        session_id: self.session_id.clone(),
                        parameters: tool.parameters.clone(),
                        started_at: tool.started_at,
                        status: ToolStatus::Starting,
                        ended_at: None,
                        result: None,
                        error: None,
                    };
                    (id, record)
                })
                .collect()
        };

        for (tool_id, record) in orphans {
            self.append_log(record.failed(message), "failed");
            self.emit(StreamEvent::ToolError {
                tool_id,
                error: message.to_owned(),
            })
            .await;
        }
    }

    // ── internals ────────────────────────────────────────────────────

    fn starting_record(&self, tool_id: Uuid, tool: &InflightTool) -> ToolExecutionRecord {
        ToolExecutionRecord {
            seq: 0,
            tool_id,
            tool_name: tool.tool_name.clone(),
            agent_name: self.agent_name.clone(),
            session_id: self.session_id.clone(),
            parameters: tool.parameters.clone(),
            started_at: tool.started_at,
            status: ToolStatus::Starting,
            ended_at: None,
            result: None,
            error: None,
        }
    }

    fn take_inflight(&self, tool_id: Uuid) -> Option<ToolExecutionRecord> {
        let tool = self.inflight.lock().remove(&tool_id)?;
        Some(self.starting_record(tool_id, &tool))
    }

    fn append_log(&self, record: ToolExecutionRecord, status: &str) {
        let tool_name = record.tool_name.clone();
        if let Err(e) = self.tool_log.append(record) {
            tracing::warn!(error = %e, tool = %tool_name, "failed to append tool log record");
        }
        TraceEvent::ToolTransition {
            session_id: self.session_id.clone(),
            tool_name,
            status: status.to_owned(),
        }
        .emit();
    }

    /// Forward to the stream when one is attached; non-streaming mode drops
    /// the emission but the tool log above has already been written.
    async fn emit(&self, event: StreamEvent) {
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.write(event).await {
                tracing::warn!(error = %e, "stream writer rejected tool event");
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
