//! Cache tiers and the capability interface they share.
//!
//! A tier answers `get`/`has` for `(entity_type, id)` pairs and may accept
//! writes. Tiers never surface I/O errors to callers: a failing tier answers
//! with a miss and logs the cause.

pub mod filesystem;
pub mod memory;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use filesystem::FilesystemTier;
pub use memory::MemoryTier;
pub use store::StoreTier;

/// Position of a tier in the latency hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Memory,
    Persistent,
    Remote,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Memory => "memory",
            TierKind::Persistent => "persistent",
            TierKind::Remote => "remote",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a tier's request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub requests: u64,
    pub hits: u64,
    /// Mean `get` latency in milliseconds.
    pub average_load_time_ms: f64,
}

/// Lock-free request counters a tier keeps for its own `stats()`.
#[derive(Debug, Default)]
pub struct TierCounters {
    requests: AtomicU64,
    hits: AtomicU64,
    total_load_micros: AtomicU64,
}

impl TierCounters {
    pub fn record(&self, hit: bool, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_load_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TierStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let total = self.total_load_micros.load(Ordering::Relaxed);
        let average_load_time_ms = if requests == 0 { 0.0 } else { total as f64 / requests as f64 / 1000.0 };
        TierStats { requests, hits, average_load_time_ms }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.total_load_micros.store(0, Ordering::Relaxed);
    }
}

/// One cache backend in the fallback chain.
///
/// `set` and `clear` default to no-ops so read-only tiers only implement
/// lookups; such tiers also report `is_writable() == false`.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Which level of the hierarchy this tier occupies.
    fn kind(&self) -> TierKind;

    /// Look up a payload. Any failure is a miss.
    async fn get(&self, entity_type: &str, id: &str) -> Option<Value>;

    /// Existence check that does not count as a read.
    async fn has(&self, entity_type: &str, id: &str) -> bool;

    /// Whether `set` stores anything.
    fn is_writable(&self) -> bool {
        true
    }

    /// Store a payload, best effort.
    async fn set(&self, _entity_type: &str, _id: &str, _payload: &Value) {}

    /// Drop every entry, best effort.
    async fn clear(&self) {}

    /// The tier's own request counters.
    fn stats(&self) -> TierStats;
}
