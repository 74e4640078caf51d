//! `get` command implementation.
//!
//! Looks up a single entity through the configured tier chain.

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use citecache_core::{Orchestrator, TierKind};

/// Parameters for the get command.
#[derive(Debug, Clone, Args)]
pub struct GetParams {
    /// Entity type, e.g. `works` or `authors`.
    pub entity_type: String,

    /// Entity identifier.
    pub id: String,
}

/// Output from the get command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOutput {
    pub entity_type: String,
    pub id: String,
    pub found: bool,
    pub tier: Option<TierKind>,
    pub load_time_ms: f64,
    pub data: Option<Value>,
}

pub async fn get_impl(cache: &Orchestrator, params: &GetParams) -> GetOutput {
    let lookup = cache.get(&params.entity_type, &params.id).await;

    GetOutput {
        entity_type: params.entity_type.clone(),
        id: params.id.clone(),
        found: lookup.found(),
        tier: lookup.tier,
        load_time_ms: lookup.load_time.as_secs_f64() * 1000.0,
        data: lookup.data,
    }
}
