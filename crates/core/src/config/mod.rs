//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CITECACHE_*)
//! 2. TOML config file (if CITECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which persistent tier (if any) the host process offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistentBackend {
    /// No persistent tier; memory and remote only.
    #[default]
    None,
    /// One JSON file per entity under `cache_dir`.
    Filesystem,
    /// SQLite entity store at `store_path`.
    Store,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CITECACHE_*)
/// 2. TOML config file (if CITECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum number of entries held by the in-process memory tier.
    ///
    /// Set via CITECACHE_MEMORY_MAX_ENTRIES environment variable.
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,

    /// Backing for the persistent local tier.
    ///
    /// Set via CITECACHE_PERSISTENT_BACKEND (`none`, `filesystem`, `store`).
    #[serde(default)]
    pub persistent_backend: PersistentBackend,

    /// Root directory of the filesystem tier.
    ///
    /// Set via CITECACHE_CACHE_DIR environment variable.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Path to the SQLite entity store.
    ///
    /// Set via CITECACHE_STORE_PATH environment variable.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Seconds a store row stays readable after it was written.
    #[serde(default = "default_store_ttl_secs")]
    pub store_ttl_secs: u64,

    /// Row cap enforced by the store after each write.
    #[serde(default = "default_store_max_entries")]
    pub store_max_entries: usize,

    /// Static host serving `<type>/<id>.json`. Empty disables the remote tier.
    ///
    /// Set via CITECACHE_REMOTE_BASE_URL environment variable.
    #[serde(default)]
    pub remote_base_url: String,

    /// GET timeout in milliseconds.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// HEAD probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// User-Agent string for remote requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Total attempts per remote `get`, including the first.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on any single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Maximum random jitter added to each delay in milliseconds.
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// How long a URL is skipped after its retries are exhausted, in milliseconds.
    #[serde(default = "default_retry_cooldown_ms")]
    pub retry_cooldown_ms: u64,
}

fn default_memory_max_entries() -> usize {
    1000
}

fn default_store_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_store_max_entries() -> usize {
    50_000
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_user_agent() -> String {
    "citecache/0.1".into()
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_retry_jitter_ms() -> u64 {
    250
}

fn default_retry_cooldown_ms() -> u64 {
    60_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            memory_max_entries: default_memory_max_entries(),
            persistent_backend: PersistentBackend::None,
            cache_dir: None,
            store_path: None,
            store_ttl_secs: default_store_ttl_secs(),
            store_max_entries: default_store_max_entries(),
            remote_base_url: String::new(),
            remote_timeout_ms: default_remote_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            user_agent: default_user_agent(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            retry_cooldown_ms: default_retry_cooldown_ms(),
        }
    }
}

impl AppConfig {
    /// Remote GET timeout as Duration for use with reqwest/tokio.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Remote HEAD probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Store row lifetime.
    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CITECACHE_`
    /// 2. TOML file from `CITECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CITECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CITECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Whether a remote host has been configured.
    pub fn remote_enabled(&self) -> bool {
        !self.remote_base_url.trim().is_empty()
    }

    /// Path for the filesystem tier.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_dir` is not set.
    pub fn require_cache_dir(&self) -> Result<&PathBuf, ConfigError> {
        self.cache_dir.as_ref().ok_or_else(|| ConfigError::Missing {
            field: "cache_dir".into(),
            hint: "Set CITECACHE_CACHE_DIR environment variable".into(),
        })
    }

    /// Path for the SQLite entity store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `store_path` is not set.
    pub fn require_store_path(&self) -> Result<&PathBuf, ConfigError> {
        self.store_path.as_ref().ok_or_else(|| ConfigError::Missing {
            field: "store_path".into(),
            hint: "Set CITECACHE_STORE_PATH environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.memory_max_entries, 1000);
        assert_eq!(config.persistent_backend, PersistentBackend::None);
        assert!(config.cache_dir.is_none());
        assert!(config.store_path.is_none());
        assert_eq!(config.remote_timeout_ms, 10_000);
        assert_eq!(config.probe_timeout_ms, 5_000);
        assert_eq!(config.retry_max_attempts, 3);
        assert!(!config.remote_enabled());
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.remote_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.store_ttl(), Duration::from_secs(604_800));
    }

    #[test]
    fn test_remote_enabled_ignores_whitespace() {
        let config = AppConfig { remote_base_url: "   ".into(), ..Default::default() };
        assert!(!config.remote_enabled());

        let config = AppConfig { remote_base_url: "https://static.example.org/data".into(), ..Default::default() };
        assert!(config.remote_enabled());
    }

    #[test]
    fn test_require_cache_dir_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_cache_dir(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_store_path_present() {
        let config = AppConfig { store_path: Some(PathBuf::from("/tmp/entities.sqlite")), ..Default::default() };
        assert_eq!(config.require_store_path().unwrap(), &PathBuf::from("/tmp/entities.sqlite"));
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let backend: PersistentBackend = serde_json::from_str("\"filesystem\"").unwrap();
        assert_eq!(backend, PersistentBackend::Filesystem);
    }
}
