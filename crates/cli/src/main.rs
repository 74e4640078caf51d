//! citecache command-line entry point.
//!
//! Results are printed to stdout as JSON. Logging goes to stderr so output
//! stays machine-readable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use citecache_client::CacheStack;
use citecache_core::AppConfig;

mod commands;

use commands::{GetParams, IndexParams, StatsParams, ValidateParams};

#[derive(Parser, Debug)]
#[command(name = "citecache")]
#[command(about = "Multi-tier cache and manifest tooling for bibliographic entities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build or refresh `index.json` manifests for a directory of entity files
    Index(IndexParams),

    /// Check a manifest tree against the files on disk
    Validate(ValidateParams),

    /// Look up one entity through the configured tiers
    Get(GetParams),

    /// Look up several entities and report cache statistics
    Stats(StatsParams),
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_stack() -> Result<CacheStack> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let stack = CacheStack::from_config(&config).await.context("failed to build cache tiers")?;
    Ok(stack)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index(params) => {
            let output = commands::index_impl(&params)
                .await
                .with_context(|| format!("failed to index {}", params.dir.display()))?;
            print_json(&output)?;
        }
        Commands::Validate(params) => {
            let report = commands::validate_impl(&params).await;
            print_json(&report)?;
            if !report.valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Get(params) => {
            let stack = open_stack().await?;
            let output = commands::get_impl(stack.orchestrator(), &params).await;
            print_json(&output)?;
            if !output.found {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Stats(params) => {
            let stack = open_stack().await?;
            let output = commands::stats_impl(stack.orchestrator(), &params).await;
            print_json(&output)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
