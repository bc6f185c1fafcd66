//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, and any other endpoint that
//! follows the OpenAI chat-completions contract.

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use sg_domain::config::LlmConfig;
use sg_domain::error::{Error, Result};
use sg_domain::stream::BoxStream;
use sg_domain::trace::TraceEvent;

use crate::sse::chunk_stream;
use crate::traits::{ChatMessage, ChatRole, Chunk, Completion, GenerateOptions, LlmProvider};

/// An adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    default_temperature: f32,
    default_max_tokens: Option<u32>,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = match &cfg.api_key_env {
            Some(env_var) => std::env::var(env_var).ok(),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            default_model: cfg.model.clone(),
            default_temperature: cfg.temperature,
            default_max_tokens: cfg.max_tokens,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], options: &GenerateOptions, stream: bool) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut body = json!({
            "model": options.model.as_deref().unwrap_or(&self.default_model),
            "messages": wire_messages,
            "temperature": options.temperature.unwrap_or(self.default_temperature),
            "stream": stream,
        });
        if let Some(max) = options.max_tokens.or(self.default_max_tokens) {
            body["max_tokens"] = json!(max);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut rb = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb.send().await.map_err(crate::from_reqwest)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "openai_compat".into(),
                message: format!("chat/completions returned {status}: {text}"),
            });
        }
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<Completion> {
        let body = self.request_body(messages, options, false);
        let start = Instant::now();
        let resp = self.post(&body).await?;

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| Error::Http(format!("failed to parse completion response: {e}")))?;

        TraceEvent::LlmRequest {
            provider: "openai_compat".into(),
            model: body["model"].as_str().unwrap_or_default().to_owned(),
            streaming: false,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        let text = payload["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| Error::Provider {
                provider: "openai_compat".into(),
                message: "response missing choices[0].message.content".into(),
            })?
            .to_owned();

        Ok(Completion { text })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<BoxStream<'static, Result<Chunk>>> {
        let body = self.request_body(messages, options, true);
        let model = body["model"].as_str().unwrap_or_default().to_owned();
        let start = Instant::now();
        let resp = self.post(&body).await?;

        TraceEvent::LlmRequest {
            provider: "openai_compat".into(),
            model,
            streaming: true,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(chunk_stream(resp, |data| {
            let payload: Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed stream payload");
                    return None;
                }
            };
            let content = payload["choices"]
                .get(0)
                .and_then(|c| c["delta"]["content"].as_str())
                .unwrap_or_default();
            if content.is_empty() {
                None
            } else {
                Some(Chunk {
                    content: content.to_owned(),
                })
            }
        }))
    }

    fn provider_id(&self) -> &str {
        "openai_compat"
    }
}
