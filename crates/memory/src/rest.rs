//! REST implementation of [`MemoryProvider`].
//!
//! Wraps a `reqwest::Client` and translates each trait method into the
//! corresponding HTTP call against the memory service, with retry +
//! exponential back-off on transient (5xx / timeout) failures. 4xx
//! responses are permanent and never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use sg_domain::config::MemoryConfig;
use sg_domain::error::{Error, Result};

use crate::provider::{MemoryProvider, RecallScope, RecalledContext, TurnMemory};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for the memory service. Created once and reused;
/// the underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestMemoryClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl RestMemoryClient {
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            max_retries: cfg.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => rb.header("X-Api-Key", key),
            None => rb,
        }
    }

    /// Execute a request with retry + exponential back-off on transient
    /// errors. 4xx responses are returned immediately.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let rb = self.decorate(build_request());
            match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Memory(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Memory(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    last_err = Some(if e.is_timeout() {
                        Error::Timeout(e.to_string())
                    } else {
                        Error::Http(e.to_string())
                    });
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Memory(format!("{endpoint}: all retries exhausted"))))
    }
}

#[derive(Debug, Deserialize)]
struct RecallResponse {
    #[serde(default)]
    entries: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl MemoryProvider for RestMemoryClient {
    async fn recall(
        &self,
        session_id: &str,
        user_input: &str,
        scope: RecallScope,
    ) -> Result<RecalledContext> {
        let url = self.url("/api/recall");
        let body = serde_json::json!({
            "session_id": session_id,
            "query": user_input,
            "cross_session": scope == RecallScope::CrossSession,
        });
        let resp = self
            .execute_with_retry("POST /api/recall", || self.http.post(&url).json(&body))
            .await?;

        let text = resp
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let parsed: RecallResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Memory(format!("failed to parse recall response: {e}: {text}")))?;

        Ok(RecalledContext {
            entries: parsed.entries,
        })
    }

    async fn remember(&self, turn: &TurnMemory) -> Result<()> {
        let url = self.url("/api/memories");
        self.execute_with_retry("POST /api/memories", || self.http.post(&url).json(turn))
            .await?;
        Ok(())
    }

    async fn forget_session(&self, session_id: &str) -> Result<()> {
        let url = self.url(&format!("/api/sessions/{session_id}"));
        self.execute_with_retry(&format!("DELETE /api/sessions/{session_id}"), || {
            self.http.delete(&url)
        })
        .await?;
        Ok(())
    }

    async fn health(&self) -> Result<serde_json::Value> {
        let url = self.url("/admin/health");
        let resp = self
            .execute_with_retry("GET /admin/health", || self.http.get(&url))
            .await?;
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Memory(format!("failed to parse health response: {e}: {text}")))
    }
}
