//! The bounded remember queue.
//!
//! `remember` runs off the request path: the orchestrator submits a turn
//! after emitting `done`, and sharded workers drain the backlog. Sharding
//! by session id preserves per-session FIFO without any lock on the hot
//! path. Overflow drops the oldest queued entry with a warning; duplicate
//! turn ids are dropped (idempotent submission).

use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use sg_domain::trace::TraceEvent;

use crate::provider::{MemoryProvider, TurnMemory};

/// How many recently seen turn ids are kept for dedupe.
const SEEN_RING_CAP: usize = 1024;

struct Shard {
    queue: Mutex<VecDeque<TurnMemory>>,
    notify: Notify,
}

struct SeenRing {
    set: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl SeenRing {
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > SEEN_RING_CAP {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }
}

/// Bounded, sharded queue feeding the memory backend.
pub struct RememberQueue {
    shards: Vec<Arc<Shard>>,
    seen: Mutex<SeenRing>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    cap_per_shard: usize,
}

impl RememberQueue {
    /// Spawn `workers` shards, each with its own drain task.
    pub fn start(provider: Arc<dyn MemoryProvider>, cap: usize, workers: usize) -> Arc<Self> {
        let workers = workers.max(1);
        let cap_per_shard = (cap / workers).max(1);

        let shards: Vec<Arc<Shard>> = (0..workers)
            .map(|_| {
                Arc::new(Shard {
                    queue: Mutex::new(VecDeque::new()),
                    notify: Notify::new(),
                })
            })
            .collect();

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(workers);
        for shard in &shards {
            let shard = shard.clone();
            let provider = provider.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let next = shard.queue.lock().pop_front();
                    match next {
                        Some(turn) => {
                            if let Err(e) = provider.remember(&turn).await {
                                tracing::warn!(
                                    session_id = %turn.session_id,
                                    turn_id = %turn.turn_id,
                                    error = %e,
                                    "remember submission failed"
                                );
                            }
                        }
                        None => {
                            if shutdown.load(Ordering::Acquire) {
                                break;
                            }
                            shard.notify.notified().await;
                        }
                    }
                }
            }));
        }

        Arc::new(Self {
            shards,
            seen: Mutex::new(SeenRing {
                set: HashSet::new(),
                order: VecDeque::new(),
            }),
            handles: Mutex::new(handles),
            shutdown,
            cap_per_shard,
        })
    }

    /// Enqueue one turn. Never blocks the caller: overflow drops the
    /// oldest queued entry, duplicates are dropped silently.
    pub fn submit(&self, turn: TurnMemory) {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!(
                session_id = %turn.session_id,
                "remember queue is draining, discarding submission"
            );
            return;
        }

        if !self.seen.lock().insert(turn.turn_id) {
            tracing::debug!(turn_id = %turn.turn_id, "duplicate remember submission dropped");
            return;
        }

        let shard_idx = shard_for(&turn.session_id, self.shards.len());
        let shard = &self.shards[shard_idx];
        let depth = {
            let mut queue = shard.queue.lock();
            if queue.len() >= self.cap_per_shard {
                if let Some(dropped) = queue.pop_front() {
                    tracing::warn!(
                        session_id = %dropped.session_id,
                        turn_id = %dropped.turn_id,
                        "remember queue overflow, dropping oldest entry"
                    );
                }
            }
            queue.push_back(turn.clone());
            queue.len()
        };
        shard.notify.notify_one();

        TraceEvent::RememberQueued {
            session_id: turn.session_id,
            shard: shard_idx,
            depth,
        }
        .emit();
    }

    /// Queued entries across all shards (excludes any turn currently being
    /// written by a worker).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.queue.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop intake and let workers drain up to `deadline`. Entries still
    /// queued at the deadline are discarded and logged.
    pub async fn drain(&self, deadline: Duration) {
        self.shutdown.store(true, Ordering::Release);
        for shard in &self.shards {
            shard.notify.notify_one();
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(deadline, join_all).await.is_err() {
            let discarded = self.len();
            tracing::warn!(
                discarded,
                "remember queue drain deadline expired, discarding backlog"
            );
        }
    }
}

fn shard_for(session_id: &str, shards: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    session_id.hash(&mut hasher);
    (hasher.finish() as usize) % shards
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
