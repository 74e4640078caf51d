//! Assemble the tier chain from configuration.

use std::sync::Arc;

use citecache_core::tier::CacheTier;
use citecache_core::{
    AppConfig, EntityStore, Error, FilesystemTier, MemoryTier, Orchestrator, PersistentBackend, Retention, StoreTier,
};

use crate::remote::{RemoteConfig, RemoteStaticTier};

/// An orchestrator over `[memory, persistent?, remote]` plus a handle to the remote tier.
pub struct CacheStack {
    orchestrator: Orchestrator,
    remote: Arc<RemoteStaticTier>,
}

impl CacheStack {
    /// Build the chain described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the configuration does not validate
    /// and propagates store or remote setup failures.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let mut tiers: Vec<Arc<dyn CacheTier>> = vec![Arc::new(MemoryTier::new(config.memory_max_entries)?)];

        match config.persistent_backend {
            PersistentBackend::None => {}
            PersistentBackend::Filesystem => {
                let root = config.require_cache_dir().map_err(|e| Error::InvalidConfig(e.to_string()))?;
                tiers.push(Arc::new(FilesystemTier::new(root)));
            }
            PersistentBackend::Store => {
                let path = config.require_store_path().map_err(|e| Error::InvalidConfig(e.to_string()))?;
                let retention =
                    Retention { ttl: Some(config.store_ttl()), max_entries: Some(config.store_max_entries) };
                let store = EntityStore::open(path, retention).await?;
                let purged = store.purge_expired().await?;
                if purged > 0 {
                    tracing::info!(purged, "purged expired entities from store");
                }
                tiers.push(Arc::new(StoreTier::new(store)));
            }
        }

        let remote = Arc::new(RemoteStaticTier::new(RemoteConfig::from(config))?);
        tiers.push(remote.clone());

        let orchestrator = Orchestrator::new(tiers)?;
        tracing::info!(
            backend = ?config.persistent_backend,
            remote = remote.is_enabled(),
            memory_max_entries = config.memory_max_entries,
            "cache stack ready"
        );

        Ok(Self { orchestrator, remote })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn remote(&self) -> &RemoteStaticTier {
        &self.remote
    }

    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }
}
