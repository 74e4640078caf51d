//! `stats` command implementation.
//!
//! Runs a batch of lookups and reports per-lookup tiers alongside the
//! aggregated statistics. Repeating an id shows promotion at work.

use clap::Args;
use serde::Serialize;

use citecache_core::{CacheStatistics, Orchestrator, TierKind};

/// Parameters for the stats command.
#[derive(Debug, Clone, Args)]
pub struct StatsParams {
    /// Entity type shared by every id.
    pub entity_type: String,

    /// Ids to look up, in order.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupSummary {
    pub id: String,
    pub tier: Option<TierKind>,
}

/// Output from the stats command.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    pub lookups: Vec<LookupSummary>,
    pub statistics: CacheStatistics,
}

pub async fn stats_impl(cache: &Orchestrator, params: &StatsParams) -> StatsOutput {
    let mut lookups = Vec::with_capacity(params.ids.len());
    for id in &params.ids {
        let lookup = cache.get(&params.entity_type, id).await;
        lookups.push(LookupSummary { id: id.clone(), tier: lookup.tier });
    }

    StatsOutput { lookups, statistics: cache.stats().await }
}
