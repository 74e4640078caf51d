//! `index` command implementation.
//!
//! Builds or refreshes the `index.json` manifests under a directory.

use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use citecache_core::{Error, IndexBuilder};

/// Parameters for the index command.
#[derive(Debug, Clone, Args)]
pub struct IndexParams {
    /// Directory holding `<id>.json` entity files.
    pub dir: PathBuf,

    /// Entity type recorded for the files (e.g. `works`).
    #[arg(short = 't', long)]
    pub entity_type: String,

    /// Also index subdirectories.
    #[arg(short, long)]
    pub recursive: bool,
}

/// Output from the index command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutput {
    pub directory: PathBuf,
    pub changed: bool,
    pub manifests_written: usize,
    pub files: usize,
    pub directories: usize,
    pub last_updated: String,
    pub skipped: Vec<PathBuf>,
}

/// Implementation of the index command.
pub async fn index_impl(params: &IndexParams) -> Result<IndexOutput, Error> {
    let outcome = IndexBuilder::new().build(&params.dir, &params.entity_type, params.recursive).await?;

    tracing::info!(
        directory = %outcome.directory.display(),
        changed = outcome.changed,
        manifests_written = outcome.manifests_written,
        skipped = outcome.skipped.len(),
        "index build finished"
    );

    Ok(IndexOutput {
        files: outcome.manifest.files.len(),
        directories: outcome.manifest.directories.len(),
        last_updated: outcome.manifest.last_updated.to_rfc3339(),
        directory: outcome.directory,
        changed: outcome.changed,
        manifests_written: outcome.manifests_written,
        skipped: outcome.skipped,
    })
}
