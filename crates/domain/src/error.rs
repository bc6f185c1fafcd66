/// Shared error type used across all ChatSG crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session store write failed: {0}")]
    Write(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent {agent}: {message}")]
    Agent { agent: String, message: String },

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("memory: {0}")]
    Memory(String),

    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("stream protocol: {0}")]
    Protocol(String),

    #[error("config: {0}")]
    Config(String),

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is worth retrying on a fallback agent
    /// (transient external failures are; protocol and store errors are not).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Timeout(_) | Error::Provider { .. } | Error::Agent { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
