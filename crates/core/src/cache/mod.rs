//! SQLite-backed entity store and shared cache record types.
//!
//! This module provides the persistent key-value store behind the store
//! variant of the persistent tier, using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - `"{entity_type}:{id}"` keyed payload storage
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Store-owned retention (expiry and LRU row cap)
//!
//! Content hashing for manifests lives here too.

pub mod connection;
pub mod entities;
pub mod entry;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::{EntityStore, Retention};
pub use entry::CacheEntry;
pub use hash::{content_hash, store_key};
