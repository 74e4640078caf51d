//! Tier-local cache record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached entity payload with access bookkeeping.
///
/// Owned by the tier holding it. Promotion copies the payload by value into
/// a fresh entry in the receiving tier; entries are never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Value,
    pub inserted_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl CacheEntry {
    /// Create an entry that has not been read yet.
    pub fn new(payload: Value) -> Self {
        let now = Utc::now();
        Self { payload, inserted_at: now, last_accessed_at: now, access_count: 0 }
    }

    /// Record a read hit.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
        self.access_count += 1;
    }
}
