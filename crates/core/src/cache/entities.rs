//! Entity record CRUD and retention.
//!
//! Rows are keyed by `"{entity_type}:{id}"`. The store enforces its own
//! retention (expiry plus an LRU row cap) so callers only ever put and get.

use super::connection::EntityStore;
use super::entry::CacheEntry;
use super::hash::store_key;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Fixed-width RFC 3339 so that string ordering in SQL matches time ordering.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("bad timestamp {raw}: {e}")))
}

impl EntityStore {
    /// Get a live (unexpired) entity and record the access.
    ///
    /// Returns None if the key doesn't exist or has expired.
    pub async fn get_entity(&self, entity_type: &str, id: &str) -> Result<Option<CacheEntry>, Error> {
        let key = store_key(entity_type, id);
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let row = conn.query_row(
                    "SELECT payload_json, inserted_at, access_count FROM entities
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                    params![key, now],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
                );

                let (payload_json, inserted_at, access_count) = match row {
                    Ok(r) => r,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                conn.execute(
                    "UPDATE entities SET last_accessed_at = ?2, access_count = access_count + 1 WHERE key = ?1",
                    params![key, now],
                )?;

                Ok(Some(CacheEntry {
                    payload: serde_json::from_str(&payload_json)?,
                    inserted_at: parse_timestamp(&inserted_at)?,
                    last_accessed_at: parse_timestamp(&now)?,
                    access_count: access_count.max(0) as u64 + 1,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a live entity exists without touching its access data.
    pub async fn contains_entity(&self, entity_type: &str, id: &str) -> Result<bool, Error> {
        let key = store_key(entity_type, id);
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM entities
                        WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
                    )",
                    params![key, now],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entity, then apply the row cap.
    pub async fn put_entity(&self, entity_type: &str, id: &str, payload: &Value) -> Result<(), Error> {
        let key = store_key(entity_type, id);
        let entity_type = entity_type.to_string();
        let payload_json = serde_json::to_string(payload)?;

        let now = Utc::now();
        let expires_at = self
            .retention
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| timestamp(now + ttl));
        let now = timestamp(now);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entities (
                        key, entity_type, payload_json, inserted_at, last_accessed_at, access_count, expires_at
                    ) VALUES (?1, ?2, ?3, ?4, ?4, 0, ?5)
                    ON CONFLICT(key) DO UPDATE SET
                        payload_json = excluded.payload_json,
                        inserted_at = excluded.inserted_at,
                        last_accessed_at = excluded.last_accessed_at,
                        expires_at = excluded.expires_at",
                    params![key, entity_type, payload_json, now, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        if let Some(max_entries) = self.retention.max_entries {
            let evicted = self.purge_lru(max_entries).await?;
            if evicted > 0 {
                tracing::debug!(evicted, max_entries, "entity store trimmed to row cap");
            }
        }

        Ok(())
    }

    /// Number of rows currently stored, expired or not.
    pub async fn count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every row.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entities", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired rows.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entities WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge least recently accessed rows until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru(&self, max_entries: usize) -> Result<u64, Error> {
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entities WHERE key IN (
                        SELECT key FROM entities ORDER BY last_accessed_at ASC, rowid ASC LIMIT ?1
                    )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
