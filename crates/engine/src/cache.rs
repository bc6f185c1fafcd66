//! The lazy agent cache.
//!
//! A bounded cache of constructed agents keyed by agent kind. Concurrent
//! misses for the same kind share one construction (single-flight via a
//! per-kind async lock). Eviction is LRU at capacity plus an idle-TTL
//! background sweep; evicted agents are disposed only after their in-flight
//! turns finish. Implements [`AgentProvider`], with registered live agents
//! passing straight through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use sg_agents::{Agent, AgentFactory, AgentHandle, AgentProvider, AgentRegistry};
use sg_domain::error::{Error, Result};
use sg_domain::trace::TraceEvent;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DISPOSE_POLL: Duration = Duration::from_millis(50);
const DISPOSE_DEADLINE: Duration = Duration::from_secs(30);

struct CacheEntry {
    agent: Arc<dyn Agent>,
    last_used: Instant,
    active: Arc<AtomicUsize>,
}

/// Decrements the entry's in-flight counter when a turn finishes.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Observable cache counters.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub live: usize,
}

pub struct AgentCache {
    registry: Arc<AgentRegistry>,
    factory: Arc<dyn AgentFactory>,
    capacity: usize,
    idle_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    building: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AgentCache {
    pub fn new(
        registry: Arc<AgentRegistry>,
        factory: Arc<dyn AgentFactory>,
        capacity: usize,
        idle_ttl: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            factory,
            capacity: capacity.max(1),
            idle_ttl,
            entries: Mutex::new(HashMap::new()),
            building: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        })
    }

    /// Start the idle-TTL background sweep.
    pub fn start_sweeper(self: &Arc<Self>) {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                cache.sweep_idle();
            }
        });
        if let Some(old) = self.sweeper.lock().replace(handle) {
            old.abort();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            live: self.entries.lock().len(),
        }
    }

    /// Checkout: bump LRU position and the in-flight counter.
    fn checkout(&self, kind: &str) -> Option<AgentHandle> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(kind)?;
        entry.last_used = Instant::now();
        entry.active.fetch_add(1, Ordering::AcqRel);
        Some(AgentHandle::with_guard(
            entry.agent.clone(),
            Box::new(ActiveGuard {
                active: entry.active.clone(),
            }),
        ))
    }

    fn insert(&self, kind: &str, agent: Arc<dyn Agent>) {
        let evicted = {
            let mut entries = self.entries.lock();
            entries.insert(
                kind.to_owned(),
                CacheEntry {
                    agent,
                    last_used: Instant::now(),
                    active: Arc::new(AtomicUsize::new(0)),
                },
            );

            let mut evicted = Vec::new();
            while entries.len() > self.capacity {
                let lru = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != kind)
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                match lru {
                    Some(key) => {
                        if let Some(entry) = entries.remove(&key) {
                            evicted.push((key, entry));
                        }
                    }
                    None => break,
                }
            }
            evicted
        };

        for (key, entry) in evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            TraceEvent::AgentCacheEvicted {
                agent_kind: key.clone(),
                idle_secs: entry.last_used.elapsed().as_secs(),
            }
            .emit();
            dispose(entry);
        }
    }

    fn sweep_idle(&self) {
        let idle: Vec<(String, CacheEntry)> = {
            let mut entries = self.entries.lock();
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, e)| {
                    e.last_used.elapsed() > self.idle_ttl
                        && e.active.load(Ordering::Acquire) == 0
                })
                .map(|(k, _)| k.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|k| entries.remove(&k).map(|e| (k, e)))
                .collect()
        };

        for (key, entry) in idle {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::info!(agent = %key, "evicting idle agent");
            TraceEvent::AgentCacheEvicted {
                agent_kind: key,
                idle_secs: entry.last_used.elapsed().as_secs(),
            }
            .emit();
            dispose(entry);
        }
    }

    /// Quiesce: stop the sweeper, await in-flight turns (bounded by
    /// `grace`), and dispose every cached agent.
    pub async fn cleanup(&self, grace: Duration) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }

        let entries: Vec<(String, CacheEntry)> = self.entries.lock().drain().collect();
        let deadline = Instant::now() + grace;
        for (key, entry) in entries {
            while entry.active.load(Ordering::Acquire) > 0 && Instant::now() < deadline {
                tokio::time::sleep(DISPOSE_POLL).await;
            }
            if entry.active.load(Ordering::Acquire) > 0 {
                tracing::warn!(agent = %key, "disposing agent with in-flight turns after grace period");
            }
            entry.agent.cleanup().await;
        }
    }
}

/// Dispose an evicted entry off the caller's path, waiting for in-flight
/// turns to finish first.
fn dispose(entry: CacheEntry) {
    tokio::spawn(async move {
        let deadline = Instant::now() + DISPOSE_DEADLINE;
        while entry.active.load(Ordering::Acquire) > 0 && Instant::now() < deadline {
            tokio::time::sleep(DISPOSE_POLL).await;
        }
        entry.agent.cleanup().await;
    });
}

#[async_trait]
impl AgentProvider for AgentCache {
    async fn agent_for(&self, kind: &str) -> Result<AgentHandle> {
        // Externally registered live agents bypass the cache.
        if let Some(agent) = self.registry.get(kind) {
            return Ok(AgentHandle::new(agent));
        }

        if let Some(handle) = self.checkout(kind) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            TraceEvent::AgentCacheHit {
                agent_kind: kind.to_owned(),
            }
            .emit();
            return Ok(handle);
        }

        // Single-flight: one construction per kind at a time.
        let gate = {
            let mut building = self.building.lock();
            building
                .entry(kind.to_owned())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _build_guard = gate.lock().await;

        // A concurrent builder may have won the race.
        if let Some(handle) = self.checkout(kind) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        TraceEvent::AgentCacheMiss {
            agent_kind: kind.to_owned(),
        }
        .emit();

        let agent = self.factory.build(kind).await?;
        self.insert(kind, agent);
        self.checkout(kind)
            .ok_or_else(|| Error::AgentNotFound(kind.to_owned()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
