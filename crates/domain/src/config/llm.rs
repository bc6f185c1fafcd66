use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which LLM adapter agents talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Base URL for the OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: String,

    /// Environment variable holding the API key. Unset = no auth header.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "d_model")]
    pub model: String,

    #[serde(default = "d_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Scripted,
            base_url: String::new(),
            api_key_env: None,
            model: d_model(),
            temperature: d_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    /// Deterministic offline provider; no network.
    #[default]
    Scripted,
    /// Any endpoint speaking the OpenAI chat-completions contract.
    OpenaiCompat,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_temperature() -> f32 {
    0.7
}
