//! Core types and shared functionality for citecache.
//!
//! This crate provides:
//! - The `CacheTier` interface with memory, filesystem, and SQLite-store tiers
//! - The `Orchestrator` that sequences tiers and promotes hits
//! - Directory manifests and the offline `IndexBuilder`
//! - Unified error types and layered configuration

mod atomic;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod stats;
pub mod tier;

pub use cache::{CacheEntry, EntityStore, Retention};
pub use config::{AppConfig, ConfigError, PersistentBackend};
pub use error::Error;
pub use manifest::{BuildOutcome, DirectoryManifest, IndexBuilder, ValidationReport};
pub use orchestrator::{CacheLookup, Orchestrator};
pub use stats::CacheStatistics;
pub use tier::{CacheTier, FilesystemTier, MemoryTier, StoreTier, TierCounters, TierKind, TierStats};
