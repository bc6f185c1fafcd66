//! `sg-memory` — the memory adapter for the ChatSG engine.
//!
//! Two operations with a latency contract: `recall` is bounded by a hard
//! budget and never blocks a request past it; `remember` is fire-and-forget
//! and drains through a bounded per-session-FIFO queue after the reply is
//! delivered.

pub mod null;
pub mod provider;
pub mod queue;
pub mod recall;
pub mod rest;

pub use null::NullMemory;
pub use provider::{MemoryProvider, RecallScope, RecalledContext, TurnMemory};
pub use queue::RememberQueue;
pub use recall::recall_within;
pub use rest::RestMemoryClient;

use std::sync::Arc;

use sg_domain::config::{MemoryBackend, MemoryConfig};
use sg_domain::error::Result;

/// Build the configured [`MemoryProvider`].
pub fn create_provider(cfg: &MemoryConfig) -> Result<Arc<dyn MemoryProvider>> {
    match cfg.backend {
        MemoryBackend::Null => {
            tracing::info!("memory backend: null (nothing is persisted)");
            Ok(Arc::new(NullMemory))
        }
        MemoryBackend::Rest => {
            let client = RestMemoryClient::new(cfg)?;
            tracing::info!(base_url = %cfg.base_url, "memory backend: rest");
            Ok(Arc::new(client))
        }
    }
}
