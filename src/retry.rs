//! Retry policy for listing requests.
//!
//! The default policy performs no retries, so a failed page request ends the
//! account's enumeration immediately. Raising `max_retries` turns on
//! exponential backoff for errors the caller marks as retryable.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts after the first failure.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 0,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Policy that gives up on the first failure.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    #[must_use]
    pub fn is_fail_fast(&self) -> bool {
        self.max_retries == 0
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::Retryable;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_is_fail_fast() {
        let config = RetryConfig::default();
        assert!(config.is_fail_fast());
        assert_eq!(config, RetryConfig::fail_fast());
        assert!(config.with_jitter);
    }

    #[test]
    fn test_retry_config_custom() {
        let config = RetryConfig::new(Duration::from_secs(2), Duration::from_secs(30), 3);

        assert_eq!(config.min_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert!(!config.is_fail_fast());
    }

    #[tokio::test]
    async fn test_fail_fast_backoff_runs_once() {
        let attempts = AtomicU32::new(0);
        let op = || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), &'static str>("boom")
        };

        let result = op.retry(RetryConfig::fail_fast().into_backoff()).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_retries_up_to_limit() {
        let attempts = AtomicU32::new(0);
        let op = || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), &'static str>("boom")
        };

        let config = RetryConfig::new(Duration::from_millis(1), Duration::from_millis(2), 2)
            .with_jitter(false);
        let result = op.retry(config.into_backoff()).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
