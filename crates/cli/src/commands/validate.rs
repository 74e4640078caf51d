//! `validate` command implementation.

use clap::Args;
use std::path::PathBuf;

use citecache_core::ValidationReport;
use citecache_core::manifest::validate;

/// Parameters for the validate command.
#[derive(Debug, Clone, Args)]
pub struct ValidateParams {
    /// Root directory of the manifest tree.
    pub dir: PathBuf,
}

pub async fn validate_impl(params: &ValidateParams) -> ValidationReport {
    validate(&params.dir).await
}
