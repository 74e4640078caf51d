//! Directory manifests for statically hosted entity files.
//!
//! Every indexed directory carries an `index.json` describing the entity
//! files it holds and the manifests of its immediate subdirectories:
//!
//! ```json
//! {
//!   "lastUpdated": "2024-05-01T12:00:00Z",
//!   "files": { "W123": { "$ref": "./W123.json", "contentHash": "…", "lastRetrieved": "…" } },
//!   "directories": { "2024": { "$ref": "./2024", "lastModified": "…" } }
//! }
//! ```
//!
//! `files` and `directories` are omitted when empty. Maps are ordered, so a
//! manifest serializes byte-identically as long as its content is unchanged.

pub mod builder;
pub mod reconcile;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use crate::Error;

pub use builder::{BuildOutcome, IndexBuilder};
pub use reconcile::{ChildDirectory, FreshFile, Reconciled, reconcile};
pub use validate::{ValidationReport, validate};

/// File name of the manifest inside each directory.
pub const MANIFEST_FILE_NAME: &str = "index.json";

/// Subdirectory holding cached query responses rather than entities.
pub const QUERY_DIR_NAME: &str = "queries";

/// Manifest record for one entity file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifestEntry {
    #[serde(rename = "$ref")]
    pub reference: String,
    pub content_hash: String,
    pub last_retrieved: DateTime<Utc>,
}

/// Manifest record summarizing one subdirectory's own manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryManifestEntry {
    #[serde(rename = "$ref")]
    pub reference: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryManifest {
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileManifestEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<String, DirectoryManifestEntry>,
}

impl DirectoryManifest {
    pub fn empty(last_updated: DateTime<Utc>) -> Self {
        Self { last_updated, files: BTreeMap::new(), directories: BTreeMap::new() }
    }

    /// Serialized form written to disk: pretty JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String, Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

/// Read the manifest in `directory`.
///
/// Returns `Ok(None)` when there is no manifest and `Error::Manifest` when
/// one exists but cannot be parsed.
pub async fn read_manifest(directory: &Path) -> Result<Option<DirectoryManifest>, Error> {
    let path = directory.join(MANIFEST_FILE_NAME);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))
}

/// Resolve a `$ref` such as `./W1.json` against the directory holding the manifest.
pub fn resolve_ref(directory: &Path, reference: &str) -> std::path::PathBuf {
    directory.join(reference.trim_start_matches("./"))
}
