//! Aggregated cache statistics.

use crate::tier::{TierKind, TierStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Point-in-time view of orchestrator statistics.
///
/// Tiers of the same kind share one entry in `tiers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub tiers: BTreeMap<TierKind, TierStats>,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// `hits / total_requests`, 0 when nothing has been requested.
    pub hit_rate: f64,
    /// Serialized bytes of every payload served from cache.
    pub bandwidth_saved: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct TierLedger {
    requests: u64,
    hits: u64,
    total_load: Duration,
}

/// One tier consultation made during a lookup.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TierProbe {
    pub kind: TierKind,
    pub hit: bool,
    pub elapsed: Duration,
}

/// Mutable counters behind `CacheStatistics`. Only the orchestrator writes here.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    tiers: BTreeMap<TierKind, TierLedger>,
    total_requests: u64,
    hits: u64,
    misses: u64,
    bandwidth_saved: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl StatsRecorder {
    pub fn new(kinds: impl IntoIterator<Item = TierKind>) -> Self {
        let tiers = kinds.into_iter().map(|k| (k, TierLedger::default())).collect();
        Self { tiers, ..Default::default() }
    }

    /// Record a finished lookup. `served_bytes` is `Some` on a hit.
    pub fn record(&mut self, probes: &[TierProbe], served_bytes: Option<u64>) {
        for probe in probes {
            let ledger = self.tiers.entry(probe.kind).or_default();
            ledger.requests += 1;
            if probe.hit {
                ledger.hits += 1;
            }
            ledger.total_load += probe.elapsed;
        }

        self.total_requests += 1;
        match served_bytes {
            Some(bytes) => {
                self.hits += 1;
                self.bandwidth_saved += bytes;
            }
            None => self.misses += 1,
        }
        self.last_updated = Some(Utc::now());
    }

    pub fn reset(&mut self) {
        let kinds: Vec<TierKind> = self.tiers.keys().copied().collect();
        *self = Self::new(kinds);
    }

    pub fn snapshot(&self) -> CacheStatistics {
        let tiers = self
            .tiers
            .iter()
            .map(|(kind, ledger)| {
                let average_load_time_ms = if ledger.requests == 0 {
                    0.0
                } else {
                    ledger.total_load.as_secs_f64() * 1000.0 / ledger.requests as f64
                };
                (*kind, TierStats { requests: ledger.requests, hits: ledger.hits, average_load_time_ms })
            })
            .collect();

        let hit_rate = if self.total_requests == 0 { 0.0 } else { self.hits as f64 / self.total_requests as f64 };

        CacheStatistics {
            tiers,
            total_requests: self.total_requests,
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            bandwidth_saved: self.bandwidth_saved,
            last_updated: self.last_updated,
        }
    }
}
