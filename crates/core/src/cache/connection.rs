//! Entity store connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use std::time::Duration;
use tokio_rusqlite::Connection;

/// Retention policy the store applies to its own rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// How long a row stays readable after it was written. `None` keeps rows forever.
    pub ttl: Option<Duration>,
    /// Row cap enforced after each write by evicting least recently accessed rows.
    pub max_entries: Option<usize>,
}

impl Default for Retention {
    fn default() -> Self {
        Self { ttl: Some(Duration::from_secs(7 * 24 * 60 * 60)), max_entries: Some(50_000) }
    }
}

/// Persistent key-value store for entity payloads.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct EntityStore {
    pub(crate) conn: Connection,
    pub(crate) retention: Retention,
}

impl EntityStore {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>, retention: Retention) -> Result<Self, Error> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, retention).await
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory(retention: Retention) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, retention).await
    }

    async fn init(conn: Connection, retention: Retention) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn, retention })
    }

    /// Retention policy this store was opened with.
    pub fn retention(&self) -> Retention {
        self.retention
    }
}
