//! `sg-engine` — the multi-agent conversational orchestration engine.
//!
//! Given a user utterance, a session id, and optional routing metadata,
//! the engine selects an agent (forced routing, agent lock, keyword and
//! capability scoring), executes it under timeouts with fallback, streams
//! the typed event sequence through a protocol-enforcing sink, persists
//! both turns, tracks unread counts, and schedules asynchronous memory
//! persistence that never blocks the reply.

pub mod cache;
pub mod cancel;
pub mod handoff;
pub mod select;
pub mod sink;
pub mod state;
pub mod turn;

mod lifecycle;

pub use cache::{AgentCache, CacheStats};
pub use cancel::CancelMap;
pub use handoff::{HandoffCoordinator, HandoffOutcome, HandoffRequest};
pub use select::select_agent;
pub use sink::{ChannelWriter, StreamSink};
pub use state::Engine;
pub use turn::{run_request, stream_request, RequestInput};
