//! Hard-budget recall.
//!
//! `recall` must never delay a request beyond its budget: on timeout or
//! backend failure the result is an empty context and the request proceeds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sg_domain::trace::TraceEvent;

use crate::provider::{MemoryProvider, RecallScope, RecalledContext};

/// Recall with a hard deadline. Expiry and backend errors both yield an
/// empty context; neither is surfaced to the caller.
pub async fn recall_within(
    provider: &Arc<dyn MemoryProvider>,
    session_id: &str,
    user_input: &str,
    scope: RecallScope,
    budget: Duration,
) -> RecalledContext {
    let start = Instant::now();
    let result = tokio::time::timeout(budget, provider.recall(session_id, user_input, scope)).await;

    let (context, timed_out) = match result {
        Ok(Ok(context)) => (context, false),
        Ok(Err(e)) => {
            tracing::warn!(
                session_id = session_id,
                error = %e,
                "memory recall failed, proceeding with empty context"
            );
            (RecalledContext::empty(), false)
        }
        Err(_) => {
            tracing::warn!(
                session_id = session_id,
                budget_ms = budget.as_millis() as u64,
                "memory recall exceeded budget, proceeding with empty context"
            );
            (RecalledContext::empty(), true)
        }
    };

    TraceEvent::MemoryRecall {
        session_id: session_id.to_owned(),
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out,
    }
    .emit();

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TurnMemory;
    use async_trait::async_trait;
    use sg_domain::error::{Error, Result};

    struct SlowMemory {
        delay: Duration,
    }

    #[async_trait]
    impl MemoryProvider for SlowMemory {
        async fn recall(
            &self,
            _session_id: &str,
            _user_input: &str,
            _scope: RecallScope,
        ) -> Result<RecalledContext> {
            tokio::time::sleep(self.delay).await;
            Ok(RecalledContext {
                entries: vec!["late fact".into()],
            })
        }
        async fn remember(&self, _turn: &TurnMemory) -> Result<()> {
            Ok(())
        }
        async fn forget_session(&self, _session_id: &str) -> Result<()> {
            Ok(())
        }
        async fn health(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    struct FailingMemory;

    #[async_trait]
    impl MemoryProvider for FailingMemory {
        async fn recall(
            &self,
            _session_id: &str,
            _user_input: &str,
            _scope: RecallScope,
        ) -> Result<RecalledContext> {
            Err(Error::Memory("backend down".into()))
        }
        async fn remember(&self, _turn: &TurnMemory) -> Result<()> {
            Ok(())
        }
        async fn forget_session(&self, _session_id: &str) -> Result<()> {
            Ok(())
        }
        async fn health(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    #[tokio::test]
    async fn fast_recall_returns_context() {
        let provider: Arc<dyn MemoryProvider> = Arc::new(SlowMemory {
            delay: Duration::from_millis(5),
        });
        let context = recall_within(
            &provider,
            "s1",
            "what did we say",
            RecallScope::Session,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(context.entries, vec!["late fact".to_string()]);
    }

    #[tokio::test]
    async fn slow_recall_times_out_to_empty() {
        let provider: Arc<dyn MemoryProvider> = Arc::new(SlowMemory {
            delay: Duration::from_millis(300),
        });
        let start = Instant::now();
        let context = recall_within(
            &provider,
            "s1",
            "anything",
            RecallScope::Session,
            Duration::from_millis(50),
        )
        .await;
        assert!(context.is_empty());
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn backend_failure_swallowed_to_empty() {
        let provider: Arc<dyn MemoryProvider> = Arc::new(FailingMemory);
        let context = recall_within(
            &provider,
            "s1",
            "anything",
            RecallScope::CrossSession,
            Duration::from_millis(100),
        )
        .await;
        assert!(context.is_empty());
    }
}
