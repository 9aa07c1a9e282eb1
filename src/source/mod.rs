pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::FetchError;
use crate::lot::models::ItemRecord;

/// Result of asking the listing source for a fresh snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(ItemRecord),
    /// The listing no longer resolves (closed or removed).
    NotFound,
}

/// Produces fresh snapshots of individual listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch one listing. `captured_at` of a found record is the time of this fetch.
    async fn fetch_listing(&self, url: &str) -> Result<FetchOutcome, FetchError>;

    fn name(&self) -> &str;
}

/// Bounded retry budget for a single refresh.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.backoff_base.saturating_mul(factor), self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(750),
            backoff_max: Duration::from_secs(5),
        }
    }
}

/// Fetch a listing, retrying failures; an exhausted budget counts as not found.
pub async fn fetch_with_retry(
    source: &dyn ListingSource,
    url: &str,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match source.fetch_listing(url).await {
            Ok(outcome) => return outcome,
            Err(e) if attempt < attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    source = source.name(),
                    url,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Listing fetch failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                warn!(
                    source = source.name(),
                    url,
                    attempts,
                    error = %e,
                    "Listing fetch failed after retries, treating as not found"
                );
            }
        }
    }

    FetchOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;

    struct Flaky {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ListingSource for Flaky {
        async fn fetch_listing(&self, url: &str) -> Result<FetchOutcome, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                return Err(FetchError::Status(503));
            }
            Ok(FetchOutcome::Found(ItemRecord {
                url: url.to_string(),
                title: "Longines".to_string(),
                price: None,
                estimate_low: None,
                estimate_high: None,
                reserve: None,
                duration: Some("5m".to_string()),
                captured_at: Utc::now(),
            }))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(750));
        assert_eq!(policy.backoff(2), Duration::from_millis(1500));
        assert_eq!(policy.backoff(3), Duration::from_millis(3000));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let source = Flaky {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let outcome = fetch_with_retry(&source, "https://x/l/1-a", &fast_policy()).await;
        assert!(matches!(outcome, FetchOutcome::Found(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_not_found() {
        let source = Flaky {
            failures_before_success: 10,
            calls: AtomicU32::new(0),
        };
        let outcome = fetch_with_retry(&source, "https://x/l/1-a", &fast_policy()).await;
        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }
}
