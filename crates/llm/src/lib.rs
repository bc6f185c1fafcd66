//! `sg-llm` — the LLM adapter seam for ChatSG agents.
//!
//! Defines the [`LlmProvider`] contract (non-streaming `generate`, streaming
//! `stream`), an OpenAI-compatible HTTP adapter, and a deterministic
//! scripted provider for offline/dev/test use.

pub mod openai;
pub mod scripted;
mod sse;
pub mod traits;

pub use openai::OpenAiCompatProvider;
pub use scripted::ScriptedProvider;
pub use traits::{ChatMessage, ChatRole, Chunk, Completion, GenerateOptions, LlmProvider};

use std::sync::Arc;

use sg_domain::config::{LlmConfig, LlmProviderKind};
use sg_domain::error::{Error, Result};

/// Build the configured [`LlmProvider`].
pub fn create_provider(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match cfg.provider {
        LlmProviderKind::Scripted => Ok(Arc::new(ScriptedProvider::new())),
        LlmProviderKind::OpenaiCompat => {
            let provider = OpenAiCompatProvider::from_config(cfg)?;
            tracing::info!(base_url = %cfg.base_url, model = %cfg.model, "using OpenAI-compatible LLM adapter");
            Ok(Arc::new(provider))
        }
    }
}

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
