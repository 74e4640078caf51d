//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, PersistentBackend};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_timeout(field: &str, value_ms: u64) -> Result<(), ConfigError> {
    if value_ms < 100 {
        return Err(invalid(field, "must be at least 100ms"));
    }
    if value_ms > 300_000 {
        return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `memory_max_entries` or `store_max_entries` is 0
    /// - a timeout is below 100ms or above 5 minutes
    /// - `retry_max_attempts` is 0 or `retry_base_delay_ms` exceeds `retry_max_delay_ms`
    /// - `remote_base_url` is set but not an http(s) URL
    ///
    /// Returns `ConfigError::Missing` if the selected persistent backend has no path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_max_entries == 0 {
            return Err(invalid("memory_max_entries", "must be greater than 0"));
        }
        if self.store_max_entries == 0 {
            return Err(invalid("store_max_entries", "must be greater than 0"));
        }

        check_timeout("remote_timeout_ms", self.remote_timeout_ms)?;
        check_timeout("probe_timeout_ms", self.probe_timeout_ms)?;

        if self.retry_max_attempts == 0 {
            return Err(invalid("retry_max_attempts", "must be at least 1"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_base_delay_ms", "must not exceed retry_max_delay_ms"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.remote_enabled() {
            let base = self.remote_base_url.trim();
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(invalid("remote_base_url", "must be an http:// or https:// URL"));
            }
        }

        match self.persistent_backend {
            PersistentBackend::None => {
                if self.cache_dir.is_some() || self.store_path.is_some() {
                    tracing::warn!(
                        "cache_dir/store_path set but persistent_backend is none; \
                         the persistent tier stays disabled"
                    );
                }
            }
            PersistentBackend::Filesystem => {
                self.require_cache_dir()?;
            }
            PersistentBackend::Store => {
                self.require_store_path()?;
            }
        }

        Ok(())
    }
}
