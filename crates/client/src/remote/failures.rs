//! Per-URL failure bookkeeping for the remote tier.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Failure history for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFailureState {
    pub last_failure_at: Instant,
    /// Consecutive transient failures since the last success.
    pub attempts: u32,
    /// While set and in the future, lookups of this URL are skipped.
    pub cooldown_until: Option<Instant>,
}

/// Failure states keyed by URL. A success or an expired cooldown drops the entry.
///
/// Expired entries for URLs that are never looked up again are swept whenever
/// a new URL starts failing, so the map only grows with live cooldowns.
#[derive(Debug, Default)]
pub struct FailureTracker {
    states: Mutex<HashMap<String, RemoteFailureState>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left on `url`'s cooldown. An expired cooldown is forgotten.
    pub async fn cooldown_remaining(&self, url: &str) -> Option<Duration> {
        let mut states = self.states.lock().await;
        let until = states.get(url)?.cooldown_until?;
        let now = Instant::now();
        if until > now {
            Some(until - now)
        } else {
            states.remove(url);
            None
        }
    }

    /// Count a transient failure and return the consecutive total.
    pub async fn record_failure(&self, url: &str) -> u32 {
        let now = Instant::now();
        let mut states = self.states.lock().await;
        if !states.contains_key(url) {
            let swept = drop_expired(&mut states, now);
            if swept > 0 {
                tracing::debug!(swept, "dropped expired remote failure states");
            }
        }
        let state = states
            .entry(url.to_string())
            .or_insert(RemoteFailureState { last_failure_at: now, attempts: 0, cooldown_until: None });
        state.attempts = state.attempts.saturating_add(1);
        state.last_failure_at = now;
        state.attempts
    }

    pub async fn arm_cooldown(&self, url: &str, cooldown: Duration) {
        let now = Instant::now();
        let mut states = self.states.lock().await;
        let state = states
            .entry(url.to_string())
            .or_insert(RemoteFailureState { last_failure_at: now, attempts: 0, cooldown_until: None });
        state.cooldown_until = Some(now + cooldown);
    }

    pub async fn clear(&self, url: &str) {
        self.states.lock().await.remove(url);
    }

    pub async fn state(&self, url: &str) -> Option<RemoteFailureState> {
        self.states.lock().await.get(url).copied()
    }

    /// Drop states whose cooldown has run out. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        drop_expired(&mut *self.states.lock().await, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.lock().await.is_empty()
    }

    pub async fn reset(&self) {
        self.states.lock().await.clear();
    }
}

fn drop_expired(states: &mut HashMap<String, RemoteFailureState>, now: Instant) -> usize {
    let before = states.len();
    states.retain(|_, s| s.cooldown_until.is_none_or(|until| until > now));
    before - states.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cdn.example.com/works/W1.json";

    #[tokio::test]
    async fn test_failures_accumulate_until_cleared() {
        let tracker = FailureTracker::new();
        assert_eq!(tracker.record_failure(URL).await, 1);
        assert_eq!(tracker.record_failure(URL).await, 2);
        assert_eq!(tracker.state(URL).await.unwrap().attempts, 2);

        tracker.clear(URL).await;
        assert!(tracker.state(URL).await.is_none());
    }

    #[tokio::test]
    async fn test_cooldown_active_then_forgotten() {
        let tracker = FailureTracker::new();
        tracker.record_failure(URL).await;
        tracker.arm_cooldown(URL, Duration::from_millis(40)).await;

        let remaining = tracker.cooldown_remaining(URL).await.unwrap();
        assert!(remaining <= Duration::from_millis(40));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(tracker.cooldown_remaining(URL).await.is_none());
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_failure_without_cooldown_is_not_skipped() {
        let tracker = FailureTracker::new();
        tracker.record_failure(URL).await;
        assert!(tracker.cooldown_remaining(URL).await.is_none());
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn test_new_failure_sweeps_expired_states() {
        let tracker = FailureTracker::new();
        for i in 0..50 {
            let url = format!("https://cdn.example.com/works/W{i}.json");
            tracker.record_failure(&url).await;
            tracker.arm_cooldown(&url, Duration::from_millis(1)).await;
        }
        tracker.arm_cooldown("live", Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        tracker.record_failure(URL).await;

        assert_eq!(tracker.len().await, 2);
        assert!(tracker.state("live").await.is_some());
        assert_eq!(tracker.state(URL).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_prune_expired_keeps_active() {
        let tracker = FailureTracker::new();
        tracker.arm_cooldown("a", Duration::ZERO).await;
        tracker.arm_cooldown("b", Duration::from_secs(60)).await;
        tracker.record_failure("c").await;

        assert_eq!(tracker.prune_expired().await, 1);
        assert!(tracker.state("a").await.is_none());
        assert!(tracker.state("b").await.is_some());
        assert!(tracker.state("c").await.is_some());
    }
}
