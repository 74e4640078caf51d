//! Read-only tier over a static host serving `{base}/{type}/{id}.json`.
//!
//! ### Failure Handling
//! - 404 is a definitive miss: no retry, no cooldown.
//! - Timeouts, network errors, other non-2xx statuses, and unparseable
//!   bodies are transient and retried with exponential backoff plus jitter.
//! - `Retry-After` replaces the exponential term when present.
//! - Once attempts are exhausted the URL is skipped until its cooldown ends.
//!
//! Failures never reach the caller; every failed lookup is a miss.

pub mod backoff;
pub mod failures;
pub mod url;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use std::time::{Duration, Instant};

pub use self::backoff::{RetryPolicy, parse_retry_after};
pub use self::failures::{FailureTracker, RemoteFailureState};
pub use self::url::{UrlError, entity_url, parse_base_url};

use citecache_core::tier::{CacheTier, TierCounters, TierKind, TierStats};
use citecache_core::{AppConfig, Error};

/// Configuration for the remote static tier.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the static host. Empty disables the tier.
    pub base_url: String,

    /// Per-attempt GET timeout (default: 10s)
    pub timeout: Duration,

    /// HEAD probe timeout (default: 5s)
    pub probe_timeout: Duration,

    /// User agent string (default: "citecache/0.1")
    pub user_agent: String,

    pub retry: RetryPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_millis(10_000),
            probe_timeout: Duration::from_millis(5_000),
            user_agent: "citecache/0.1".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&AppConfig> for RemoteConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.remote_base_url.clone(),
            timeout: config.remote_timeout(),
            probe_timeout: config.probe_timeout(),
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy {
                max_attempts: config.retry_max_attempts,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                max_delay: Duration::from_millis(config.retry_max_delay_ms),
                jitter: Duration::from_millis(config.retry_jitter_ms),
                cooldown: Duration::from_millis(config.retry_cooldown_ms),
            },
        }
    }
}

/// Result of a single GET attempt.
#[derive(Debug)]
enum Attempt {
    Found(Value),
    NotFound,
    Transient { reason: Error, retry_after: Option<Duration> },
}

/// HTTP-backed, read-only cache tier.
pub struct RemoteStaticTier {
    http: Client,
    base: Option<reqwest::Url>,
    config: RemoteConfig,
    failures: FailureTracker,
    counters: TierCounters,
}

impl RemoteStaticTier {
    /// Create a remote tier with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for a malformed base URL and
    /// `Error::InvalidConfig` for an unusable retry policy or if the HTTP
    /// client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, Error> {
        config.retry.validate()?;
        let base = parse_base_url(&config.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        if base.is_none() {
            tracing::debug!("remote tier disabled: no base URL configured");
        }

        Ok(Self { http, base, config, failures: FailureTracker::new(), counters: TierCounters::default() })
    }

    pub fn is_enabled(&self) -> bool {
        self.base.is_some()
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Per-URL failure states, for inspection and pruning.
    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    /// URL an entity would be fetched from, if the tier is enabled.
    pub fn url_for(&self, entity_type: &str, id: &str) -> Option<reqwest::Url> {
        let base = self.base.as_ref()?;
        match entity_url(base, entity_type, id) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(entity_type, id, error = %e, "cannot build remote URL");
                None
            }
        }
    }

    async fn fetch_with_retry(&self, url: &reqwest::Url) -> Option<Value> {
        let key = url.as_str();

        if let Some(remaining) = self.failures.cooldown_remaining(key).await {
            tracing::debug!(url = %url, ?remaining, "remote URL cooling down, skipping");
            return None;
        }

        let policy = &self.config.retry;
        for attempt in 1..=policy.max_attempts {
            match self.attempt(url).await {
                Attempt::Found(payload) => {
                    self.failures.clear(key).await;
                    return Some(payload);
                }
                Attempt::NotFound => {
                    tracing::debug!(url = %url, "remote entity not found");
                    self.failures.clear(key).await;
                    return None;
                }
                Attempt::Transient { reason, retry_after } => {
                    let failures = self.failures.record_failure(key).await;

                    if attempt == policy.max_attempts {
                        self.failures.arm_cooldown(key, policy.cooldown).await;
                        tracing::warn!(
                            url = %url,
                            attempts = attempt,
                            failures,
                            cooldown = ?policy.cooldown,
                            error = %reason,
                            "remote fetch failed, cooling down"
                        );
                        return None;
                    }

                    let delay = policy.delay_for(attempt, retry_after, policy.sample_jitter());
                    tracing::debug!(url = %url, attempt, ?delay, error = %reason, "remote fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        None
    }

    async fn attempt(&self, url: &reqwest::Url) -> Attempt {
        let response = match self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .timeout(self.config.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                let reason = Error::FetchTimeout(format!("{} after {:?}", url, self.config.timeout));
                return Attempt::Transient { reason, retry_after: None };
            }
            Err(e) => {
                return Attempt::Transient { reason: Error::HttpError(format!("network error: {}", e)), retry_after: None };
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Attempt::NotFound;
        }
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers(), Utc::now());
            let reason = Error::HttpError(format!("status {}", status.as_u16()));
            return Attempt::Transient { reason, retry_after };
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = Error::HttpError(format!("failed to read response: {}", e));
                return Attempt::Transient { reason, retry_after: None };
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(payload) => Attempt::Found(payload),
            Err(e) => Attempt::Transient { reason: Error::Serialization(e), retry_after: None },
        }
    }
}

#[async_trait]
impl CacheTier for RemoteStaticTier {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
        let start = Instant::now();
        let payload = match self.url_for(entity_type, id) {
            Some(url) => self.fetch_with_retry(&url).await,
            None => None,
        };
        self.counters.record(payload.is_some(), start.elapsed());
        payload
    }

    async fn has(&self, entity_type: &str, id: &str) -> bool {
        let Some(url) = self.url_for(entity_type, id) else {
            return false;
        };

        match self.http.head(url.clone()).timeout(self.config.probe_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "remote probe failed");
                false
            }
        }
    }

    fn is_writable(&self) -> bool {
        false
    }

    /// Resets counters and failure states; remote content is untouched.
    async fn clear(&self) {
        self.failures.reset().await;
        self.counters.reset();
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(base_url: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(1),
            user_agent: "citecache-test/0.1".to_string(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                jitter: Duration::from_millis(2),
                cooldown: Duration::from_millis(150),
            },
        }
    }

    #[test]
    fn test_remote_config_default() {
        let config = RemoteConfig::default();
        assert!(config.base_url.is_empty());
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.probe_timeout, Duration::from_millis(5_000));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_remote_config_from_app_config() {
        let app = AppConfig {
            remote_base_url: "https://cdn.example.com".into(),
            retry_max_attempts: 5,
            retry_cooldown_ms: 1_000,
            ..AppConfig::default()
        };
        let config = RemoteConfig::from(&app);
        assert_eq!(config.base_url, "https://cdn.example.com");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.cooldown, Duration::from_secs(1));
        assert_eq!(config.timeout, app.remote_timeout());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = RemoteStaticTier::new(config("ftp://example.com"));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unusable_retry_policy_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/works/W1.json").with_status(200).with_body("{}").expect(0).create_async().await;

        let mut no_attempts = config(&server.url());
        no_attempts.retry.max_attempts = 0;
        assert!(matches!(RemoteStaticTier::new(no_attempts), Err(Error::InvalidConfig(_))));

        let mut inverted = config(&server.url());
        inverted.retry.base_delay = inverted.retry.max_delay + Duration::from_millis(1);
        assert!(matches!(RemoteStaticTier::new(inverted), Err(Error::InvalidConfig(_))));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_hit_returns_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works/W123.json")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"W123","title":"Example"}"#)
            .expect(1)
            .create_async()
            .await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        let payload = tier.get("works", "W123").await;

        assert_eq!(payload, Some(json!({"id": "W123", "title": "Example"})));
        assert_eq!(tier.stats().hits, 1);
        assert!(tier.failures().is_empty().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_miss_without_cooldown() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/works/W404.json").with_status(404).expect(2).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "W404").await.is_none());
        assert!(tier.get("works", "W404").await.is_none());

        assert!(tier.failures().is_empty().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries_then_cool_down() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/works/W500.json").with_status(500).expect(3).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "W500").await.is_none());

        // cooling down: no request reaches the server
        assert!(tier.get("works", "W500").await.is_none());
        mock.assert_async().await;

        let url = tier.url_for("works", "W500").unwrap();
        let state = tier.failures().state(url.as_str()).await.unwrap();
        assert_eq!(state.attempts, 3);
        assert!(state.cooldown_until.is_some());
        assert_eq!(tier.stats().requests, 2);
        assert_eq!(tier.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_cooldown_expiry_allows_new_attempts() {
        let mut server = mockito::Server::new_async().await;
        let failing = server.mock("GET", "/works/W1.json").with_status(503).expect(3).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "W1").await.is_none());
        failing.assert_async().await;
        failing.remove_async().await;

        let healthy =
            server.mock("GET", "/works/W1.json").with_status(200).with_body(r#"{"id":"W1"}"#).create_async().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tier.get("works", "W1").await, Some(json!({"id": "W1"})));
        assert!(tier.failures().is_empty().await);
        healthy.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_clears_prior_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock =
            server.mock("GET", "/works/W2.json").with_status(200).with_body(r#"{"id":"W2"}"#).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        let url = tier.url_for("works", "W2").unwrap();
        assert_eq!(tier.failures().record_failure(url.as_str()).await, 1);

        assert!(tier.get("works", "W2").await.is_some());
        assert!(tier.failures().state(url.as_str()).await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unparseable_body_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/works/BAD.json").with_status(200).with_body("<html>").expect(3).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "BAD").await.is_none());
        mock.assert_async().await;

        let url = tier.url_for("works", "BAD").unwrap();
        assert!(tier.failures().state(url.as_str()).await.unwrap().cooldown_until.is_some());
    }

    #[tokio::test]
    async fn test_retry_after_header_drives_delay() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works/W503.json")
            .with_status(503)
            .with_header("retry-after", "0")
            .expect(2)
            .create_async()
            .await;

        // without the header the single retry would wait five seconds
        let mut slow = config(&server.url());
        slow.retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(10),
            jitter: Duration::ZERO,
            cooldown: Duration::from_secs(60),
        };
        let tier = RemoteStaticTier::new(slow).unwrap();

        let start = Instant::now();
        assert!(tier.get("works", "W503").await.is_none());

        assert!(start.elapsed() < Duration::from_secs(2), "waited {:?}", start.elapsed());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_has_ignores_active_cooldown() {
        let mut server = mockito::Server::new_async().await;
        let failing = server.mock("GET", "/works/W7.json").with_status(500).expect(3).create_async().await;
        let head = server.mock("HEAD", "/works/W7.json").with_status(200).expect(1).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "W7").await.is_none());
        let url = tier.url_for("works", "W7").unwrap();
        assert!(tier.failures().cooldown_remaining(url.as_str()).await.is_some());

        assert!(tier.has("works", "W7").await);
        assert!(tier.failures().state(url.as_str()).await.is_some());
        failing.assert_async().await;
        head.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_failure_states_do_not_accumulate() {
        let mut base = config("http://127.0.0.1:9");
        base.retry.max_attempts = 1;
        base.retry.cooldown = Duration::from_millis(1);
        let tier = RemoteStaticTier::new(base).unwrap();

        for i in 0..20 {
            assert!(tier.get("works", &format!("W{i}")).await.is_none());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        for i in 0..5 {
            assert!(tier.get("authors", &format!("A{i}")).await.is_none());
        }
        // earlier cooldowns have long expired; only the latest ones can remain
        assert!(tier.failures().len().await <= 5, "retained {}", tier.failures().len().await);
    }

    #[tokio::test]
    async fn test_unreachable_host_cools_down() {
        let tier = RemoteStaticTier::new(config("http://127.0.0.1:9")).unwrap();
        assert!(tier.get("works", "W1").await.is_none());

        let url = tier.url_for("works", "W1").unwrap();
        let state = tier.failures().state(url.as_str()).await.unwrap();
        assert!(state.cooldown_until.is_some());
    }

    #[tokio::test]
    async fn test_empty_base_url_is_always_miss() {
        let tier = RemoteStaticTier::new(config("")).unwrap();
        assert!(!tier.is_enabled());
        assert!(tier.get("works", "W1").await.is_none());
        assert!(!tier.has("works", "W1").await);
        assert!(tier.url_for("works", "W1").is_none());
    }

    #[tokio::test]
    async fn test_has_uses_head_request() {
        let mut server = mockito::Server::new_async().await;
        let present = server.mock("HEAD", "/works/W1.json").with_status(200).expect(1).create_async().await;
        let absent = server.mock("HEAD", "/works/W2.json").with_status(404).expect(1).create_async().await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.has("works", "W1").await);
        assert!(!tier.has("works", "W2").await);

        assert_eq!(tier.stats().requests, 0);
        present.assert_async().await;
        absent.assert_async().await;
    }

    #[tokio::test]
    async fn test_ids_are_percent_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works/10.1000%2Fxyz%20v2.json")
            .with_status(200)
            .with_body(r#"{"id":"10.1000/xyz v2"}"#)
            .expect(1)
            .create_async()
            .await;

        let tier = RemoteStaticTier::new(config(&server.url())).unwrap();
        assert!(tier.get("works", "10.1000/xyz v2").await.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_remote_tier_is_read_only() {
        let tier = RemoteStaticTier::new(config("")).unwrap();
        assert!(!tier.is_writable());
        assert_eq!(tier.kind(), TierKind::Remote);
    }
}
