//! Change detection between a prior manifest and freshly scanned content.
//!
//! Pure and I/O-free. Unchanged entries are carried over verbatim, including
//! their timestamps; that is what keeps a rebuild over unchanged files from
//! rewriting every manifest up the tree.

use super::{DirectoryManifest, DirectoryManifestEntry, FileManifestEntry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A scanned entity file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshFile {
    pub reference: String,
    pub content_hash: String,
}

/// A subdirectory whose own manifest has just been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDirectory {
    pub reference: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub manifest: DirectoryManifest,
    pub changed: bool,
}

/// Merge fresh scan results into the prior manifest.
///
/// `fresh_dirs == None` means subdirectories were not scanned; the prior
/// `directories` map is then kept as is.
pub fn reconcile(
    existing: Option<&DirectoryManifest>, fresh_files: BTreeMap<String, FreshFile>,
    fresh_dirs: Option<BTreeMap<String, ChildDirectory>>, now: DateTime<Utc>,
) -> Reconciled {
    let files: BTreeMap<String, FileManifestEntry> = fresh_files
        .into_iter()
        .map(|(id, fresh)| {
            let prior = existing
                .and_then(|m| m.files.get(&id))
                .filter(|e| e.content_hash == fresh.content_hash && e.reference == fresh.reference);
            let entry = match prior {
                Some(entry) => entry.clone(),
                None => FileManifestEntry {
                    reference: fresh.reference,
                    content_hash: fresh.content_hash,
                    last_retrieved: now,
                },
            };
            (id, entry)
        })
        .collect();

    let mut newest_child: Option<DateTime<Utc>> = None;
    let directories: BTreeMap<String, DirectoryManifestEntry> = match fresh_dirs {
        None => existing.map(|m| m.directories.clone()).unwrap_or_default(),
        Some(children) => children
            .into_iter()
            .map(|(name, child)| {
                let prior = existing
                    .and_then(|m| m.directories.get(&name))
                    .filter(|e| e.last_modified == child.last_updated && e.reference == child.reference);
                let entry = match prior {
                    Some(entry) => entry.clone(),
                    None => {
                        newest_child = newest_child.max(Some(child.last_updated));
                        DirectoryManifestEntry { reference: child.reference, last_modified: child.last_updated }
                    }
                };
                (name, entry)
            })
            .collect(),
    };

    let changed = match existing {
        None => true,
        Some(prior) => prior.files != files || prior.directories != directories,
    };

    let last_updated = match existing {
        Some(prior) if !changed => prior.last_updated,
        _ => newest_child.map_or(now, |child| child.max(now)),
    };

    Reconciled { manifest: DirectoryManifest { last_updated, files, directories }, changed }
}
