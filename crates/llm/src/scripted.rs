//! Deterministic offline provider.
//!
//! Used by the CLI's offline mode and by tests: responses are either popped
//! from a queued script or derived from the last user message, and streamed
//! token by token. Same input, same output — no network, no randomness.

use std::collections::VecDeque;

use futures_util::stream;
use parking_lot::Mutex;

use sg_domain::error::Result;
use sg_domain::stream::BoxStream;

use crate::traits::{ChatMessage, ChatRole, Chunk, Completion, GenerateOptions, LlmProvider};

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
        }
    }

    /// Pre-load canned replies, consumed in FIFO order before any derived
    /// reply is produced.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(reply.into());
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> String {
        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        derive_reply(messages)
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a deterministic reply from the last user message.
fn derive_reply(messages: &[ChatMessage]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");

    if last_user.trim().is_empty() {
        return String::new();
    }
    format!("Understood. Regarding \"{}\": here is my take.", last_user.trim())
}

/// Split text into whitespace-preserving tokens so that the concatenation
/// of all chunks equals the original text byte for byte.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch.is_whitespace() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> Result<Completion> {
        Ok(Completion {
            text: self.next_reply(messages),
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> Result<BoxStream<'static, Result<Chunk>>> {
        let text = self.next_reply(messages);
        let chunks: Vec<Result<Chunk>> = tokenize(&text)
            .into_iter()
            .map(|content| Ok(Chunk { content }))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}
