//! Multi-tier lookup with promotion on hit.
//!
//! The orchestrator walks an injected, ordered tier list. Tiers are consulted
//! one after another, never concurrently, so a local hit never waits on a
//! remote probe. A hit is copied into every tier ranked above the one that
//! served it before the result is returned. A full miss is reported to the
//! caller, who decides whether to hit the live API and `set` the result.

use crate::Error;
use crate::stats::{CacheStatistics, StatsRecorder, TierProbe};
use crate::tier::{CacheTier, TierKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Outcome of `Orchestrator::get`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub data: Option<Value>,
    /// Tier that served the hit.
    pub tier: Option<TierKind>,
    /// Time spent walking tiers, excluding promotion writes.
    pub load_time: Duration,
}

impl CacheLookup {
    pub fn found(&self) -> bool {
        self.data.is_some()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }
}

/// Ordered tier chain with statistics.
pub struct Orchestrator {
    tiers: Vec<Arc<dyn CacheTier>>,
    stats: Mutex<StatsRecorder>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<TierKind> = self.tiers.iter().map(|t| t.kind()).collect();
        f.debug_struct("Orchestrator").field("tiers", &kinds).finish()
    }
}

impl Orchestrator {
    /// Build an orchestrator over `tiers`, fastest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the list is empty or a slower tier
    /// kind is placed ahead of a faster one.
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Result<Self, Error> {
        if tiers.is_empty() {
            return Err(Error::InvalidConfig("orchestrator needs at least one tier".into()));
        }
        if let Some(pair) = tiers.windows(2).find(|pair| pair[0].kind() > pair[1].kind()) {
            return Err(Error::InvalidConfig(format!(
                "tier order must be memory, persistent, remote: {} placed before {}",
                pair[0].kind(),
                pair[1].kind()
            )));
        }

        let stats = StatsRecorder::new(tiers.iter().map(|t| t.kind()));
        Ok(Self { tiers, stats: Mutex::new(stats) })
    }

    /// Configured tiers in lookup order.
    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    /// Look up an entity, promoting a hit into the faster tiers.
    pub async fn get(&self, entity_type: &str, id: &str) -> CacheLookup {
        let start = Instant::now();
        let mut probes = Vec::with_capacity(self.tiers.len());
        let mut served = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            let tier_start = Instant::now();
            let payload = tier.get(entity_type, id).await;
            probes.push(TierProbe { kind: tier.kind(), hit: payload.is_some(), elapsed: tier_start.elapsed() });

            if let Some(payload) = payload {
                served = Some((index, payload));
                break;
            }
        }

        let load_time = start.elapsed();

        match served {
            Some((index, payload)) => {
                let kind = self.tiers[index].kind();
                tracing::debug!(entity_type, id, tier = %kind, ?load_time, "cache hit");

                self.promote(index, entity_type, id, &payload).await;

                let bytes = payload.to_string().len() as u64;
                self.stats.lock().await.record(&probes, Some(bytes));

                CacheLookup { data: Some(payload), tier: Some(kind), load_time }
            }
            None => {
                tracing::debug!(entity_type, id, ?load_time, "cache miss in every tier");
                self.stats.lock().await.record(&probes, None);
                CacheLookup { data: None, tier: None, load_time }
            }
        }
    }

    /// Write a hit into every writable tier ranked strictly above `hit_index`.
    async fn promote(&self, hit_index: usize, entity_type: &str, id: &str, payload: &Value) {
        for tier in self.tiers[..hit_index].iter().filter(|t| t.is_writable()) {
            tier.set(entity_type, id, payload).await;
            tracing::debug!(entity_type, id, tier = %tier.kind(), "promoted");
        }
    }

    /// Store a payload in every writable tier, typically after a live API fetch.
    pub async fn set(&self, entity_type: &str, id: &str, payload: &Value) {
        for tier in self.tiers.iter().filter(|t| t.is_writable()) {
            tier.set(entity_type, id, payload).await;
        }
    }

    /// True as soon as any tier reports the entity.
    pub async fn has(&self, entity_type: &str, id: &str) -> bool {
        for tier in &self.tiers {
            if tier.has(entity_type, id).await {
                return true;
            }
        }
        false
    }

    pub async fn stats(&self) -> CacheStatistics {
        self.stats.lock().await.snapshot()
    }

    /// Clear every tier and reset statistics.
    pub async fn clear(&self) {
        for tier in &self.tiers {
            tier.clear().await;
        }
        self.stats.lock().await.reset();
        tracing::info!(tiers = self.tiers.len(), "cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntityStore, Retention};
    use crate::tier::{MemoryTier, StoreTier, TierCounters, TierStats};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    /// Read-only tier over a fixed map, standing in for a remote host.
    struct FixedTier {
        kind: TierKind,
        entries: HashMap<String, Value>,
        counters: TierCounters,
    }

    impl FixedTier {
        fn remote(entries: &[(&str, Value)]) -> Self {
            Self {
                kind: TierKind::Remote,
                entries: entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                counters: TierCounters::default(),
            }
        }
    }

    #[async_trait]
    impl CacheTier for FixedTier {
        fn kind(&self) -> TierKind {
            self.kind
        }

        async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
            let hit = self.entries.get(&format!("{entity_type}/{id}")).cloned();
            self.counters.record(hit.is_some(), Duration::ZERO);
            hit
        }

        async fn has(&self, entity_type: &str, id: &str) -> bool {
            self.entries.contains_key(&format!("{entity_type}/{id}"))
        }

        fn is_writable(&self) -> bool {
            false
        }

        fn stats(&self) -> TierStats {
            self.counters.snapshot()
        }
    }

    async fn chain(remote: FixedTier) -> (Orchestrator, Arc<MemoryTier>, Arc<StoreTier>) {
        let memory = Arc::new(MemoryTier::new(10).unwrap());
        let persistent = Arc::new(StoreTier::new(EntityStore::open_in_memory(Retention::default()).await.unwrap()));
        let orchestrator = Orchestrator::new(vec![
            memory.clone() as Arc<dyn CacheTier>,
            persistent.clone() as Arc<dyn CacheTier>,
            Arc::new(remote) as Arc<dyn CacheTier>,
        ])
        .unwrap();
        (orchestrator, memory, persistent)
    }

    #[test]
    fn test_empty_tier_list_rejected() {
        assert!(matches!(Orchestrator::new(Vec::new()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_out_of_order_tiers_rejected() {
        let tiers: Vec<Arc<dyn CacheTier>> =
            vec![Arc::new(FixedTier::remote(&[])), Arc::new(MemoryTier::new(1).unwrap())];
        assert!(matches!(Orchestrator::new(tiers), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_remote_hit_promotes_to_all_faster_tiers() {
        let (cache, memory, persistent) = chain(FixedTier::remote(&[("works/W123", json!({"id": "W123"}))])).await;

        let first = cache.get("works", "W123").await;
        assert!(first.found());
        assert_eq!(first.tier, Some(TierKind::Remote));
        assert!(memory.has("works", "W123").await);
        assert!(persistent.has("works", "W123").await);

        let second = cache.get("works", "W123").await;
        assert_eq!(second.tier, Some(TierKind::Memory));
        assert_eq!(second.data, Some(json!({"id": "W123"})));
    }

    #[tokio::test]
    async fn test_middle_hit_promotes_only_upward() {
        let (cache, memory, persistent) = chain(FixedTier::remote(&[])).await;
        persistent.set("authors", "A1", &json!({"id": "A1"})).await;

        let lookup = cache.get("authors", "A1").await;

        assert_eq!(lookup.tier, Some(TierKind::Persistent));
        assert!(memory.has("authors", "A1").await);
        assert_eq!(cache.get("authors", "A1").await.tier, Some(TierKind::Memory));
    }

    #[tokio::test]
    async fn test_full_miss_is_definitive() {
        let (cache, memory, _) = chain(FixedTier::remote(&[])).await;

        let lookup = cache.get("works", "W404").await;

        assert!(!lookup.found());
        assert_eq!(lookup.tier, None);
        assert!(!memory.has("works", "W404").await);

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.tiers[&TierKind::Remote].requests, 1);
    }

    #[tokio::test]
    async fn test_hit_tier_never_gets_slower() {
        let (cache, _, _) = chain(FixedTier::remote(&[
            ("works/W1", json!(1)),
            ("works/W2", json!(2)),
            ("works/W3", json!(3)),
        ]))
        .await;

        for id in ["W1", "W2", "W3", "W1", "W2"] {
            let first = cache.get("works", id).await.tier.unwrap();
            let second = cache.get("works", id).await.tier.unwrap();
            assert!(second <= first);
        }
    }

    #[tokio::test]
    async fn test_set_skips_read_only_tiers() {
        let (cache, memory, persistent) = chain(FixedTier::remote(&[])).await;

        cache.set("sources", "S1", &json!({"id": "S1"})).await;

        assert!(memory.has("sources", "S1").await);
        assert!(persistent.has("sources", "S1").await);
        assert_eq!(cache.get("sources", "S1").await.tier, Some(TierKind::Memory));
    }

    #[tokio::test]
    async fn test_has_short_circuits() {
        let (cache, _, _) = chain(FixedTier::remote(&[("works/W9", json!(9))])).await;
        assert!(cache.has("works", "W9").await);
        assert!(!cache.has("works", "W10").await);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let (cache, memory, _) = chain(FixedTier::remote(&[("works/W1", json!({"id": "W1"}))])).await;
        cache.get("works", "W1").await;
        cache.get("works", "W1").await;
        cache.get("works", "W2").await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bandwidth_saved, 2 * json!({"id": "W1"}).to_string().len() as u64);
        assert!(stats.last_updated.is_some());

        cache.clear().await;

        assert!(memory.is_empty().await);
        let stats = cache.stats().await;
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
