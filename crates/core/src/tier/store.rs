//! Persistent tier backed by the SQLite entity store.
//!
//! Retention is the store's business; this tier only translates store
//! errors into misses and skipped writes.

use super::{CacheTier, TierCounters, TierKind, TierStats};
use crate::cache::EntityStore;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug)]
pub struct StoreTier {
    store: EntityStore,
    counters: TierCounters,
}

impl StoreTier {
    pub fn new(store: EntityStore) -> Self {
        Self { store, counters: TierCounters::default() }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}

#[async_trait]
impl CacheTier for StoreTier {
    fn kind(&self) -> TierKind {
        TierKind::Persistent
    }

    async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
        let start = Instant::now();
        let payload = match self.store.get_entity(entity_type, id).await {
            Ok(entry) => entry.map(|e| e.payload),
            Err(e) => {
                tracing::warn!(entity_type, id, error = %e, "entity store read failed");
                None
            }
        };
        self.counters.record(payload.is_some(), start.elapsed());
        payload
    }

    async fn has(&self, entity_type: &str, id: &str) -> bool {
        self.store
            .contains_entity(entity_type, id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(entity_type, id, error = %e, "entity store existence check failed");
                false
            })
    }

    async fn set(&self, entity_type: &str, id: &str, payload: &Value) {
        if let Err(e) = self.store.put_entity(entity_type, id, payload).await {
            tracing::warn!(entity_type, id, error = %e, "entity store write skipped");
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.store.delete_all().await {
            tracing::warn!(error = %e, "entity store clear failed");
        }
        self.counters.reset();
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}
