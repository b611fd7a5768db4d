//! Bounded retry with backoff for external calls.
//!
//! The policy is an injectable collaborator so exporters and the classifier
//! can be exercised with [`NoRetry`] or a fake in tests.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Upper bound on any single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Why a failed call may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Network hiccup, timeout or server-side failure
    Transient,
    /// The remote side asked us to slow down
    RateLimited,
}

/// Implemented by error types that know whether they are worth retrying.
pub trait Transient {
    /// `None` for permanent failures (bad credentials, malformed requests).
    fn retry_class(&self) -> Option<RetryClass>;
}

/// Decides how many times and how long to wait between attempts.
pub trait RetryPolicy: Send + Sync {
    /// Retries allowed after the first attempt.
    fn max_retries(&self) -> u32;

    /// Delay before retry number `attempt` (0-based).
    fn delay_for(&self, attempt: u32, class: RetryClass) -> Duration;
}

/// Exponential backoff: `base * multiplier^attempt`, stretched for rate limits.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    base_delay: Duration,
    multiplier: u64,
    rate_limit_multiplier: u64,
}

impl ExponentialBackoff {
    /// Build a policy from explicit values.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, multiplier: u64) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier: multiplier.max(1),
            rate_limit_multiplier: 3,
        }
    }

    /// Build a policy from the `[retry]` config section.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier.max(1),
            rate_limit_multiplier: config.rate_limit_multiplier.max(1),
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn delay_for(&self, attempt: u32, class: RetryClass) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        let factor = match class {
            RetryClass::Transient => factor,
            RetryClass::RateLimited => factor.saturating_mul(self.rate_limit_multiplier),
        };
        let millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(millis.saturating_mul(factor)).min(MAX_DELAY)
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn max_retries(&self) -> u32 {
        0
    }

    fn delay_for(&self, _attempt: u32, _class: RetryClass) -> Duration {
        Duration::ZERO
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// At most `1 + policy.max_retries()` attempts are made. The last error is
/// returned on exhaustion.
pub async fn retry<T, E, F, Fut>(policy: &dyn RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let max_retries = policy.max_retries();
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(class) = err.retry_class() else {
                    return Err(err);
                };
                if attempt >= max_retries {
                    tracing::warn!("{} failed after {} attempts: {}", label, attempt + 1, err);
                    return Err(err);
                }

                let delay = policy.delay_for(attempt, class);
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    max_retries + 1,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
