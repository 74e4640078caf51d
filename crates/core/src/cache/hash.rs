//! Content hashing and cache key derivation.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the content hash of an entity payload.
///
/// The payload is serialized compactly with object keys in sorted order
/// (`serde_json::Map` is a `BTreeMap`), so two payloads that differ only in
/// key order or whitespace on disk hash identically.
pub fn content_hash(payload: &Value) -> String {
    let canonical = payload.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key under which the entity store files a record: `"{entity_type}:{id}"`.
pub fn store_key(entity_type: &str, id: &str) -> String {
    format!("{entity_type}:{id}")
}
