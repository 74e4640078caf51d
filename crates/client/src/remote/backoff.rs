//! Retry policy and delay computation.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

use citecache_core::Error;

/// Retry and cooldown settings for remote fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per lookup, including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles each retry (default: 500ms)
    pub base_delay: Duration,

    /// Upper bound on any single delay (default: 10s)
    pub max_delay: Duration,

    /// Upper bound on the random amount added to each delay (default: 250ms)
    pub jitter: Duration,

    /// How long a URL is skipped once its attempts are exhausted (default: 60s)
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(250),
            cooldown: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for zero attempts or a base delay above `max_delay`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("retry max_attempts must be at least 1".into()));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::InvalidConfig(format!(
                "retry base_delay {:?} exceeds max_delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    ///
    /// `min(base * 2^(attempt-1) + jitter, max_delay)`, with a server-supplied
    /// `Retry-After` standing in for the exponential term.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>, jitter: Duration) -> Duration {
        let exponential = retry_after.unwrap_or_else(|| {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        });
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    /// A uniformly random jitter in `[0, self.jitter]`.
    pub fn sample_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random_range(0..=max_ms))
    }
}

/// Read `Retry-After` as either delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(50),
            cooldown: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_validate_rejects_unusable_policies() {
        assert!(policy().validate().is_ok());
        assert!(RetryPolicy::default().validate().is_ok());

        let no_attempts = RetryPolicy { max_attempts: 0, ..policy() };
        assert!(matches!(no_attempts.validate(), Err(Error::InvalidConfig(_))));

        let inverted = RetryPolicy { base_delay: Duration::from_secs(5), ..policy() };
        assert!(matches!(inverted.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.delay_for(1, None, Duration::ZERO), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, None, Duration::ZERO), Duration::from_millis(200));
        assert_eq!(p.delay_for(3, None, Duration::from_millis(7)), Duration::from_millis(407));
    }

    #[test]
    fn test_delay_capped_including_jitter() {
        let p = policy();
        assert_eq!(p.delay_for(4, None, Duration::from_millis(300)), Duration::from_millis(1000));
        assert_eq!(p.delay_for(60, None, Duration::ZERO), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_after_replaces_exponential_term() {
        let p = policy();
        let delay = p.delay_for(1, Some(Duration::from_millis(600)), Duration::from_millis(20));
        assert_eq!(delay, Duration::from_millis(620));
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(30)), Duration::ZERO), p.max_delay);
    }

    #[test]
    fn test_sample_jitter_in_range() {
        let p = policy();
        for _ in 0..100 {
            assert!(p.sample_jitter() <= p.jitter);
        }
        let none = RetryPolicy { jitter: Duration::ZERO, ..p };
        assert_eq!(none.sample_jitter(), Duration::ZERO);
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers, Utc::now()), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers, now), Some(Duration::from_secs(10)));

        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(parse_retry_after(&headers, later), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_absent_or_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers, Utc::now()), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers, Utc::now()), None);
    }
}
