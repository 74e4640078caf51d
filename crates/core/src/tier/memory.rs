//! Bounded in-process tier with least-recently-used eviction.

use super::{CacheTier, TierCounters, TierKind, TierStats};
use crate::Error;
use crate::cache::{CacheEntry, store_key};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

/// Default bound on the number of entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    /// Monotonic access sequence; breaks ties between equal timestamps.
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Remove the entry with the oldest `last_accessed_at`.
    fn evict_lru(&mut self) -> Option<String> {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.entry.last_accessed_at, slot.seq))
            .map(|(key, _)| key.clone())?;
        self.slots.remove(&victim);
        Some(victim)
    }
}

/// In-process map bounded by entry count.
///
/// Eviction scans every slot, which is fine at the default bound of a
/// thousand entries.
#[derive(Debug)]
pub struct MemoryTier {
    max_entries: usize,
    state: Mutex<State>,
    counters: TierCounters,
}

impl MemoryTier {
    /// Create a tier holding at most `max_entries` payloads.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when `max_entries` is zero.
    pub fn new(max_entries: usize) -> Result<Self, Error> {
        if max_entries == 0 {
            return Err(Error::InvalidConfig("memory tier max_entries must be greater than 0".into()));
        }
        Ok(Self { max_entries, state: Mutex::new(State::default()), counters: TierCounters::default() })
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.state.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the stored entry without recording an access.
    pub async fn entry(&self, entity_type: &str, id: &str) -> Option<CacheEntry> {
        let state = self.state.lock().await;
        state.slots.get(&store_key(entity_type, id)).map(|slot| slot.entry.clone())
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            state: Mutex::new(State::default()),
            counters: TierCounters::default(),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
        let start = Instant::now();
        let key = store_key(entity_type, id);

        let payload = {
            let mut state = self.state.lock().await;
            let seq = state.bump();
            state.slots.get_mut(&key).map(|slot| {
                slot.entry.touch();
                slot.seq = seq;
                slot.entry.payload.clone()
            })
        };

        self.counters.record(payload.is_some(), start.elapsed());
        payload
    }

    async fn has(&self, entity_type: &str, id: &str) -> bool {
        self.state.lock().await.slots.contains_key(&store_key(entity_type, id))
    }

    async fn set(&self, entity_type: &str, id: &str, payload: &Value) {
        let key = store_key(entity_type, id);
        let mut state = self.state.lock().await;
        let seq = state.bump();

        if !state.slots.contains_key(&key) {
            while state.slots.len() >= self.max_entries {
                match state.evict_lru() {
                    Some(victim) => tracing::debug!(key = %victim, "memory tier evicted entry"),
                    None => break,
                }
            }
        }

        state.slots.insert(key, Slot { entry: CacheEntry::new(payload.clone()), seq });
    }

    async fn clear(&self) {
        self.state.lock().await.slots.clear();
        self.counters.reset();
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}
