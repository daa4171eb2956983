//! HTTP retry executor: policy-driven retries with rate-limit-aware backoff.
//!
//! Ported from the teacher's `retry.rs` and generalized to the full backoff-strategy set
//! and `Retry-After` handling described in `original_source/core/retry_utils.py`.

use crate::errors::RetryableError;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    CustomExponential { base: u32 },
    RateLimit,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_strategy: BackoffStrategy,
    pub rate_limit_base_delay: Duration,
    pub rate_limit_max_delay: Duration,
    pub respect_retry_after: bool,
    pub jitter: bool,
    pub timeout: Option<Duration>,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential,
            rate_limit_base_delay: Duration::from_secs(30),
            rate_limit_max_delay: Duration::from_secs(300),
            respect_retry_after: true,
            jitter: true,
            timeout: None,
            retryable_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn from_env_with_prefix(prefix: &str) -> Self {
        let default = Self::default();
        let env_u32 = |suffix: &str, default: u32| -> u32 {
            std::env::var(format!("{prefix}_{suffix}"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let env_secs = |suffix: &str, default: Duration| -> Duration {
            std::env::var(format!("{prefix}_{suffix}"))
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            max_retries: env_u32("MAX_RETRIES", default.max_retries),
            base_delay: env_secs("BASE_DELAY_SECS", default.base_delay),
            max_delay: env_secs("MAX_DELAY_SECS", default.max_delay),
            rate_limit_base_delay: env_secs(
                "RATE_LIMIT_BASE_DELAY_SECS",
                default.rate_limit_base_delay,
            ),
            rate_limit_max_delay: env_secs(
                "RATE_LIMIT_MAX_DELAY_SECS",
                default.rate_limit_max_delay,
            ),
            ..default
        }
    }

    /// Computed delay for the given zero-indexed attempt, using the non-rate-limit
    /// backoff strategy. Caps at `max_delay` and applies jitter if enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = match self.backoff_strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay * (attempt + 1),
            BackoffStrategy::Exponential => {
                self.base_delay.mul_f64(2f64.powi(attempt as i32))
            }
            BackoffStrategy::CustomExponential { base } => {
                self.base_delay.mul_f64((base as f64).powi(attempt as i32))
            }
            BackoffStrategy::RateLimit => self
                .rate_limit_base_delay
                .mul_f64(2f64.powi(attempt as i32)),
        };
        let capped = raw.min(self.max_delay);
        self.apply_jitter(capped)
    }

    /// Computed delay when the failure was classified as rate-limited but no usable
    /// `Retry-After` value was present.
    pub fn rate_limit_delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self
            .rate_limit_base_delay
            .mul_f64(2f64.powi(attempt as i32));
        let capped = raw.min(self.rate_limit_max_delay);
        self.apply_jitter(capped)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = rand::rng().random_range(0.9..=1.1);
        delay.mul_f64(factor)
    }
}

pub fn qdrant_retry_policy() -> RetryPolicy {
    RetryPolicy::from_env_with_prefix("EMBEDDER_RETRY")
}

pub fn source_retry_policy(namespace: &str) -> RetryPolicy {
    RetryPolicy::from_env_with_prefix(&format!("{}_RETRY", namespace.to_uppercase()))
}

/// Parses a `Retry-After` header value: either an integer number of seconds, or an
/// HTTP-date (RFC 7231 IMF-fixdate, structurally an RFC 2822 date). Clamps the result to
/// be non-negative seconds from now.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }
    let parsed = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let now = chrono::Utc::now();
    let delta_secs = (parsed.with_timezone(&chrono::Utc) - now).num_seconds();
    Some(Duration::from_secs(delta_secs.max(0) as u64))
}

/// The error type adapters feed into [`retry_with_policy`]. Built at the HTTP call site so
/// the `Retry-After` header (read off the `reqwest::Response` before its body is consumed)
/// survives into the executor instead of being thrown away with the response.
#[derive(Debug)]
pub enum HttpError {
    Transport(String),
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    Parse(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Transport(msg) => write!(f, "transport error: {msg}"),
            HttpError::Status { status, message, .. } => write!(f, "{message} (status {status})"),
            HttpError::Parse(msg) => write!(f, "failed to parse response: {msg}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl RetryableError for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport(_) => true,
            HttpError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            HttpError::Parse(_) => false,
        }
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, HttpError::Status { status: 429, .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            HttpError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub total_time: Duration,
    pub last_error: String,
}

impl std::fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({:?}): {}",
            self.attempts, self.total_time, self.last_error
        )
    }
}

impl std::error::Error for RetryExhausted {}

/// Executes `op` with policy-driven retries. `op` returns `Result<T, E>`; errors are
/// classified via [`RetryableError`]. Per-attempt deadlines (`policy.timeout`) are the
/// caller's responsibility — typically enforced by the adapter's `reqwest::Client`
/// timeout (`crate::http_client`) rather than here, since a generic `E` cannot be
/// constructed from a bare `Elapsed`.
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
        let result = op().await;

        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                let rate_limited = err.is_rate_limited();
                let exhausted = attempt >= policy.max_retries;

                if !retryable || exhausted {
                    return Err(RetryExhausted {
                        attempts: attempt + 1,
                        total_time: start.elapsed(),
                        last_error: err.to_string(),
                    });
                }

                let advised = if rate_limited && policy.respect_retry_after {
                    err.retry_after()
                } else {
                    None
                };

                // Boundary property: a Retry-After beyond rate_limit_max_delay means the
                // 429 is not retried at all, even though attempts remain.
                if let Some(advised) = advised {
                    if advised > policy.rate_limit_max_delay {
                        return Err(RetryExhausted {
                            attempts: attempt + 1,
                            total_time: start.elapsed(),
                            last_error: err.to_string(),
                        });
                    }
                }

                let delay = match advised {
                    Some(advised) => policy.apply_jitter(advised),
                    None if rate_limited => policy.rate_limit_delay_for_attempt(attempt),
                    None => policy.delay_for_attempt(attempt),
                };

                warn!(
                    retry.label = label,
                    retry.attempt = attempt + 1,
                    retry.delay_ms = delay.as_millis() as u64,
                    retry.rate_limited = rate_limited,
                    retry.reason = %err,
                    "retrying after failure"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn delay_calculation_exponential() {
        let policy = RetryPolicy {
            jitter: false,
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_caps_at_max_delay() {
        let policy = RetryPolicy {
            jitter: false,
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(15));
    }

    #[test]
    fn parse_retry_after_integer_seconds() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("-5"), Some(Duration::from_secs(0)));
    }

    #[test]
    fn retry_after_over_rate_limit_max_is_not_honored() {
        let policy = RetryPolicy::default();
        let advised = Duration::from_secs(600);
        assert!(advised > policy.rate_limit_max_delay);
    }

    #[tokio::test]
    async fn retry_with_policy_honors_retry_after_within_cap() {
        let policy = RetryPolicy {
            max_retries: 3,
            rate_limit_max_delay: Duration::from_secs(5),
            jitter: false,
            ..RetryPolicy::default()
        };
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result: Result<(), RetryExhausted> = retry_with_policy(&policy, "test", || async {
            if attempts.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(HttpError::Status {
                    status: 429,
                    message: "rate limited".to_string(),
                    retry_after: Some(Duration::from_millis(5)),
                })
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn retry_with_policy_abandons_retry_after_exceeding_cap() {
        let policy = RetryPolicy {
            max_retries: 3,
            rate_limit_max_delay: Duration::from_secs(5),
            jitter: false,
            ..RetryPolicy::default()
        };
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result: Result<(), RetryExhausted> = retry_with_policy(&policy, "test", || async {
            attempts.fetch_add(1, Ordering::Relaxed);
            Err::<(), _>(HttpError::Status {
                status: 429,
                message: "rate limited".to_string(),
                retry_after: Some(Duration::from_secs(600)),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retry_with_policy_falls_back_when_no_retry_after() {
        let policy = RetryPolicy {
            max_retries: 1,
            rate_limit_base_delay: Duration::from_millis(1),
            rate_limit_max_delay: Duration::from_secs(5),
            jitter: false,
            ..RetryPolicy::default()
        };
        let attempts = std::sync::atomic::AtomicU32::new(0);

        let result: Result<(), RetryExhausted> = retry_with_policy(&policy, "test", || async {
            if attempts.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(HttpError::Status {
                    status: 429,
                    message: "rate limited".to_string(),
                    retry_after: None,
                })
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }
}
