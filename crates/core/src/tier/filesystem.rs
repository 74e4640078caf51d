//! Filesystem-backed persistent tier for server-like processes.
//!
//! Layout: `<cache_dir>/<entity_type>/<encoded_id>.json`, one raw entity
//! payload per file. Writes land in a sibling temp file first and are renamed
//! into place so readers never see a partial payload.

use super::{CacheTier, TierCounters, TierKind, TierStats};
use crate::atomic::write_atomic;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Percent-encode a name into a safe file stem.
///
/// Everything outside `[A-Za-z0-9._~-]` becomes `%XX`, and `%` itself is
/// encoded, so distinct names never share a file. A leading `.` is encoded
/// too, which rules out hidden files and `.`/`..`. The empty name maps to `%`,
/// which no other input produces.
pub fn encode_file_stem(raw: &str) -> String {
    let encoded = urlencoding::encode(raw);
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None if encoded.is_empty() => "%".to_string(),
        None => encoded.into_owned(),
    }
}

/// One JSON file per entity under a root directory.
#[derive(Debug)]
pub struct FilesystemTier {
    root: PathBuf,
    counters: TierCounters,
}

impl FilesystemTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), counters: TierCounters::default() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file that holds `(entity_type, id)`.
    pub fn entity_path(&self, entity_type: &str, id: &str) -> PathBuf {
        self.root
            .join(encode_file_stem(entity_type))
            .join(format!("{}.json", encode_file_stem(id)))
    }

    async fn read(&self, path: &Path) -> Option<Value> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "filesystem tier read failed");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "filesystem tier holds corrupt JSON");
                None
            }
        }
    }

    async fn write(&self, path: &Path, payload: &Value) -> std::io::Result<()> {
        let body = serde_json::to_vec(payload).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        write_atomic(path, &body).await
    }

    async fn remove_type_dirs(&self) -> std::io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTier for FilesystemTier {
    fn kind(&self) -> TierKind {
        TierKind::Persistent
    }

    async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
        let start = Instant::now();
        let payload = self.read(&self.entity_path(entity_type, id)).await;
        self.counters.record(payload.is_some(), start.elapsed());
        payload
    }

    async fn has(&self, entity_type: &str, id: &str) -> bool {
        tokio::fs::try_exists(self.entity_path(entity_type, id))
            .await
            .unwrap_or(false)
    }

    async fn set(&self, entity_type: &str, id: &str, payload: &Value) {
        let path = self.entity_path(entity_type, id);
        if let Err(e) = self.write(&path, payload).await {
            tracing::warn!(path = %path.display(), error = %e, "filesystem tier write skipped");
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.remove_type_dirs().await {
            tracing::warn!(root = %self.root.display(), error = %e, "filesystem tier clear incomplete");
        }
        self.counters.reset();
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}
