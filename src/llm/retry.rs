//! Blocking retry loop with exponential backoff

use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,

    /// Initial delay between retries (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Spread retries by ±20%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);

        let delay = if self.jitter {
            capped * (0.8 + rand_jitter() * 0.4)
        } else {
            capped
        };

        Duration::from_millis(delay as u64)
    }
}

/// Cheap jitter source (0.0 to 1.0)
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Transient, try again
    Retry,

    /// Permanent, give up
    NoRetry,

    /// Rate limited - use provided delay if available
    RateLimited { retry_after_ms: Option<u64> },
}

/// Errors that can be classified for retry
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

/// Run `operation` until it succeeds, fails permanently, or runs out of retries.
pub fn with_retry<T, E, F>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0;

    loop {
        let err = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let classification = err.classify();
        if classification == RetryClassification::NoRetry {
            debug!("{operation_name}: non-retryable error on attempt {}: {err}", attempt + 1);
            return Err(err);
        }

        if attempt >= config.max_retries {
            warn!("{operation_name}: max retries ({}) exceeded: {err}", config.max_retries);
            return Err(err);
        }

        let delay = match classification {
            RetryClassification::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis(ms.min(config.max_delay_ms)),
            _ => config.delay_for_attempt(attempt),
        };

        warn!(
            "{operation_name}: attempt {} failed, retrying in {delay:?}: {err}",
            attempt + 1
        );

        std::thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;

    fn instant(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(30_000)); // capped
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let out: Result<&str, ProviderError> = with_retry(&instant(3), "test", || {
            calls += 1;
            if calls < 3 {
                Err(ProviderError::ServerError("502".into()))
            } else {
                Ok("done")
            }
        });

        assert_eq!(out, Ok("done"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        let mut calls = 0;
        let out: Result<(), ProviderError> = with_retry(&instant(5), "test", || {
            calls += 1;
            Err(ProviderError::Authentication("nope".into()))
        });

        assert!(out.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_are_bounded() {
        let mut calls = 0;
        let out: Result<(), ProviderError> = with_retry(&instant(2), "test", || {
            calls += 1;
            Err(ProviderError::RateLimited { retry_after_ms: Some(0) })
        });

        assert!(out.is_err());
        assert_eq!(calls, 3);
    }
}
