//! Manifest consistency checks.

use super::{DirectoryManifest, read_manifest, resolve_ref};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of validating a manifest tree. Problems are collected, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub files_checked: usize,
    pub missing_files: Vec<PathBuf>,
    pub directories_checked: usize,
    /// Subdirectories whose own `lastUpdated` disagrees with the parent's record,
    /// or whose manifest is missing or unreadable.
    pub mismatched_directories: Vec<PathBuf>,
    pub problems: Vec<String>,
}

/// Check that every file a manifest references exists and that every listed
/// subdirectory's manifest matches the parent's `lastModified`, recursively.
pub async fn validate(directory: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    match read_manifest(directory).await {
        Ok(Some(manifest)) => validate_tree(directory, manifest, &mut report).await,
        Ok(None) => report.problems.push(format!("{}: no manifest", directory.display())),
        Err(e) => report.problems.push(e.to_string()),
    }

    report.valid = report.problems.is_empty();
    if !report.valid {
        tracing::warn!(
            directory = %directory.display(),
            problems = report.problems.len(),
            "manifest validation failed"
        );
    }
    report
}

async fn validate_tree(directory: &Path, manifest: DirectoryManifest, report: &mut ValidationReport) {
    for (id, entry) in &manifest.files {
        report.files_checked += 1;
        let path = resolve_ref(directory, &entry.reference);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            report.problems.push(format!("{}: file for {id} is missing", path.display()));
            report.missing_files.push(path);
        }
    }

    for (name, entry) in &manifest.directories {
        report.directories_checked += 1;
        let path = resolve_ref(directory, &entry.reference);

        let child = match read_manifest(&path).await {
            Ok(Some(child)) => child,
            Ok(None) => {
                report.problems.push(format!("{}: subdirectory {name} has no manifest", path.display()));
                report.mismatched_directories.push(path);
                continue;
            }
            Err(e) => {
                report.problems.push(e.to_string());
                report.mismatched_directories.push(path);
                continue;
            }
        };

        if child.last_updated != entry.last_modified {
            report.problems.push(format!(
                "{}: lastUpdated {} does not match parent's lastModified {}",
                path.display(),
                child.last_updated.to_rfc3339(),
                entry.last_modified.to_rfc3339()
            ));
            report.mismatched_directories.push(path.clone());
        }

        Box::pin(validate_tree(&path, child, report)).await;
    }
}
