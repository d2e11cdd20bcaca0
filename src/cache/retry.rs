//! Retry executor with failure classification and exponential backoff
//!
//! - `RateLimited`: retried from a longer base delay with its own budget,
//!   honouring the server's `Retry-After` hint as a floor
//! - `Transient`: retried up to `max_retries` times
//! - `Fatal`: returned immediately
//!
//! Delays double on every retry of the same class and get optional random
//! jitter so instances do not retry in lockstep. The jittered delay never
//! exceeds `max_delay`.

use super::throttle::Throttle;
use crate::config::RetryConfig;
use crate::errors::{FailureKind, FetchError, FetchResult};
use crate::logger::{self, LogTag};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_base_delay: Duration,
    pub max_rate_limit_retries: u32,
    pub max_delay: Duration,
    /// Fraction of each delay added as random jitter (0.0 - 0.5)
    pub jitter: f64,
    /// Timeout per attempt; elapsed counts as a transient failure
    pub call_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            rate_limit_base_delay: Duration::from_millis(config.rate_limit_base_delay_ms),
            max_rate_limit_retries: config.max_rate_limit_retries,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 0.5),
            call_timeout: match config.call_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            max_rate_limit_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the `retry`-th retry (0-based) from `base`
    pub fn backoff_delay(&self, base: Duration, retry: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(retry.min(20));
        let delay = base.saturating_mul(multiplier).min(self.max_delay);

        if self.jitter > 0.0 {
            let jitter_ms = (delay.as_millis() as f64 * self.jitter) as u64;
            if jitter_ms > 0 {
                let extra = rand::thread_rng().gen_range(0..=jitter_ms);
                return (delay + Duration::from_millis(extra)).min(self.max_delay);
            }
        }
        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Bookkeeping for one retry loop, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    pub attempt_number: u32,
    pub next_delay: Duration,
}

pub struct RetryExecutor {
    provider: String,
    policy: RetryPolicy,
    throttle: Option<Throttle>,
}

impl RetryExecutor {
    pub fn new(provider: &str, policy: RetryPolicy) -> Self {
        Self {
            provider: provider.to_string(),
            policy,
            throttle: None,
        }
    }

    /// Pace between attempts
    ///
    /// The final attempt is not paced here: the caller paces it after handing
    /// the result on, while it still holds the provider's gate slot.
    pub fn with_throttle(mut self, throttle: Option<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Run `fetch` until it succeeds, fails fatally or exhausts its budget
    pub async fn run<T, F, Fut>(&self, mut fetch: F) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = FetchAttempt {
            attempt_number: 1,
            next_delay: Duration::ZERO,
        };
        let mut transient_retries = 0u32;
        let mut rate_limit_retries = 0u32;

        loop {
            let result = self.call_once(&mut fetch).await;

            let error = match result {
                Ok(value) => {
                    if attempt.attempt_number > 1 {
                        logger::debug(
                            LogTag::Retry,
                            &format!(
                                "{} succeeded on attempt {}",
                                self.provider, attempt.attempt_number
                            ),
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match error.kind() {
                FailureKind::Fatal => {
                    logger::debug(
                        LogTag::Retry,
                        &format!("{} fatal failure, not retrying: {}", self.provider, error),
                    );
                    return Err(error);
                }
                FailureKind::Transient => {
                    if transient_retries >= self.policy.max_retries {
                        return Err(self.exhausted(attempt, error));
                    }
                    let delay = self
                        .policy
                        .backoff_delay(self.policy.base_delay, transient_retries);
                    transient_retries += 1;
                    delay
                }
                FailureKind::RateLimited => {
                    if rate_limit_retries >= self.policy.max_rate_limit_retries {
                        return Err(self.exhausted(attempt, error));
                    }
                    let backoff = self
                        .policy
                        .backoff_delay(self.policy.rate_limit_base_delay, rate_limit_retries);
                    let hinted = error
                        .retry_after()
                        .map(|hint| hint.min(self.policy.max_delay))
                        .unwrap_or_default();
                    rate_limit_retries += 1;
                    backoff.max(hinted)
                }
            };

            attempt.next_delay = delay;
            logger::warning(
                LogTag::Retry,
                &format!(
                    "{} attempt {} failed ({}): {} - retrying in {}ms",
                    self.provider,
                    attempt.attempt_number,
                    error.kind(),
                    error,
                    delay.as_millis()
                ),
            );

            if let Some(throttle) = &self.throttle {
                throttle.pace().await;
            }
            tokio::time::sleep(delay).await;
            attempt.attempt_number += 1;
        }
    }

    async fn call_once<T, F, Fut>(&self, fetch: &mut F) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        match self.policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::transient(format!(
                    "{} call timed out after {}ms",
                    self.provider,
                    limit.as_millis()
                ))),
            },
            None => fetch().await,
        }
    }

    fn exhausted(&self, attempt: FetchAttempt, error: FetchError) -> FetchError {
        logger::warning(
            LogTag::Retry,
            &format!(
                "{} giving up after {} attempts: {}",
                self.provider, attempt.attempt_number, error
            ),
        );
        error
    }
}
