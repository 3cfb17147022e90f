//! Retry Policy
//!
//! Exponential backoff for idempotent gateway reads. Mutations (query
//! dispatch, upload, delete, retry) are never retried automatically.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Retry configuration for idempotent requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = single attempt)
    pub max_retries: u32,

    /// Initial backoff delay
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f32,

    /// Add jitter to backoff
    pub use_jitter: bool,

    /// Retry on these status codes (0 = transport failure)
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
            retry_status_codes: vec![0, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for attempt N (0-indexed)
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * f64::from(self.backoff_multiplier).powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            // Up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(duration_ms)
    }

    /// Whether a failed attempt should be retried
    #[must_use]
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        attempt < self.max_retries && self.retry_status_codes.contains(&error.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            use_jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_for_attempt(0), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(400));
        assert_eq!(policy.backoff_for_attempt(10), Duration::from_millis(5_000));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let d = policy.backoff_for_attempt(0).as_millis();
            assert!((200..=250).contains(&d), "backoff {d} out of range");
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&ApiError::transport("reset"), 0));
        assert!(policy.should_retry(&ApiError::new(503, "down"), 1));
        assert!(!policy.should_retry(&ApiError::new(503, "down"), 2));
        assert!(!policy.should_retry(&ApiError::new(500, "boom"), 0));
        assert!(!policy.should_retry(&ApiError::new(401, "nope"), 0));
        assert!(!RetryPolicy::disabled().should_retry(&ApiError::transport("x"), 0));
    }
}
