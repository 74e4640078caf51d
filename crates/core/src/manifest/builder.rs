//! Offline manifest builder.
//!
//! Scans a directory of entity files, hashes each payload, and merges the
//! result into the directory's existing `index.json`. The manifest is only
//! rewritten when its structural content changes. Builds against the same
//! directory must not run concurrently; the last writer wins.

use super::reconcile::{ChildDirectory, FreshFile, reconcile};
use super::{DirectoryManifest, MANIFEST_FILE_NAME, QUERY_DIR_NAME, read_manifest};
use crate::Error;
use crate::atomic::write_atomic;
use crate::cache::content_hash;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of building one directory (and, when recursive, its subtree).
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub directory: PathBuf,
    pub manifest: DirectoryManifest,
    /// Whether this directory's manifest was rewritten.
    pub changed: bool,
    /// Manifests written across the whole subtree.
    pub manifests_written: usize,
    /// Files and directories that could not be read or parsed.
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct Listing {
    /// (entity id, file name, path)
    files: Vec<(String, String, PathBuf)>,
    /// (directory name, path)
    directories: Vec<(String, PathBuf)>,
}

/// Query-cache files carry encoded query strings in their names.
fn is_query_file(stem: &str) -> bool {
    stem.contains('=') || stem.contains('?')
}

async fn list_directory(directory: &Path) -> Result<Listing, Error> {
    let mut listing = Listing::default();
    let mut entries = tokio::fs::read_dir(directory).await?;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            if name != QUERY_DIR_NAME {
                listing.directories.push((name, entry.path()));
            }
        } else if file_type.is_file() && name != MANIFEST_FILE_NAME {
            if let Some(stem) = name.strip_suffix(".json")
                && !stem.is_empty()
                && !is_query_file(stem)
            {
                listing.files.push((stem.to_string(), name.clone(), entry.path()));
            }
        }
    }

    listing.files.sort();
    listing.directories.sort();
    Ok(listing)
}

async fn hash_file(path: &Path) -> Result<String, Error> {
    let bytes = tokio::fs::read(path).await?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes)?;
    Ok(content_hash(&payload))
}

/// Builds and merges directory manifests.
#[derive(Clone)]
pub struct IndexBuilder {
    clock: Clock,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder").finish_non_exhaustive()
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self { clock: Arc::new(Utc::now) }
    }

    /// Use a custom time source for fresh timestamps.
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self { clock: Arc::new(clock) }
    }

    /// Build the manifest for `directory`.
    ///
    /// With `recursive`, immediate subdirectories are built first, depth-first,
    /// and summarized in `directories`. Unreadable entity files are skipped and
    /// reported in `BuildOutcome::skipped` instead of failing the build.
    ///
    /// # Errors
    ///
    /// Returns an error if `directory` cannot be listed or the manifest cannot
    /// be written.
    pub async fn build(&self, directory: &Path, entity_type: &str, recursive: bool) -> Result<BuildOutcome, Error> {
        if entity_type.trim().is_empty() {
            return Err(Error::InvalidInput("entity type must not be empty".into()));
        }
        self.build_dir(directory, entity_type, recursive).await
    }

    async fn build_dir(&self, directory: &Path, entity_type: &str, recursive: bool) -> Result<BuildOutcome, Error> {
        let listing = list_directory(directory).await?;

        let existing = match read_manifest(directory).await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(directory = %directory.display(), error = %e, "ignoring unreadable manifest");
                None
            }
        };

        let mut skipped = Vec::new();
        let mut manifests_written = 0;

        let mut fresh_files = BTreeMap::new();
        for (id, file_name, path) in listing.files {
            match hash_file(&path).await {
                Ok(content_hash) => {
                    fresh_files.insert(id, FreshFile { reference: format!("./{file_name}"), content_hash });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entity file");
                    skipped.push(path);
                }
            }
        }

        let fresh_dirs = if recursive {
            let mut children = BTreeMap::new();
            for (name, path) in listing.directories {
                let reference = format!("./{name}");
                match Box::pin(self.build_dir(&path, entity_type, true)).await {
                    Ok(child) => {
                        manifests_written += child.manifests_written;
                        skipped.extend(child.skipped);
                        children.insert(name, ChildDirectory { reference, last_updated: child.manifest.last_updated });
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping subdirectory");
                        skipped.push(path);
                        // Keep the last known summary so one bad subtree doesn't churn the parent.
                        if let Some(prior) = existing.as_ref().and_then(|m| m.directories.get(&name)) {
                            children.insert(
                                name,
                                ChildDirectory { reference: prior.reference.clone(), last_updated: prior.last_modified },
                            );
                        }
                    }
                }
            }
            Some(children)
        } else {
            None
        };

        let reconciled = reconcile(existing.as_ref(), fresh_files, fresh_dirs, (self.clock)());

        if reconciled.changed {
            let body = reconciled.manifest.to_pretty_json()?;
            write_atomic(&directory.join(MANIFEST_FILE_NAME), body.as_bytes()).await?;
            manifests_written += 1;
            tracing::info!(
                directory = %directory.display(),
                entity_type,
                files = reconciled.manifest.files.len(),
                directories = reconciled.manifest.directories.len(),
                "manifest updated"
            );
        } else {
            tracing::debug!(directory = %directory.display(), entity_type, "manifest unchanged");
        }

        Ok(BuildOutcome {
            directory: directory.to_path_buf(),
            manifest: reconciled.manifest,
            changed: reconciled.changed,
            manifests_written,
            skipped,
        })
    }
}
