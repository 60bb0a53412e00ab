// src/orchestrator/retry.rs
// Bounded exponential backoff around a single provider's call

use super::usage::{AttemptOutcome, AttemptRecord, UsageRecorder};
use crate::providers::{ProviderClient, ProviderError};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
        }
    }
}

pub struct RetryController {
    policy: RetryPolicy,
    usage: Arc<UsageRecorder>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, usage: Arc<UsageRecorder>) -> Self {
        Self { policy, usage }
    }

    /// Call one provider up to `max_attempts` times, sleeping between
    /// attempts, retrying only transient failures. Every attempt is timed and
    /// metered whether it succeeds or not.
    pub async fn call_with_retry(
        &self,
        client: &dyn ProviderClient,
        message: &str,
        timeout: Duration,
        deadline: Option<Instant>,
    ) -> Result<String, ProviderError> {
        let provider = client.name();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_err: Option<ProviderError> = None;

        for attempt in 1..=max_attempts {
            let Some(call_timeout) = clamp_to_deadline(timeout, deadline) else {
                break;
            };

            let start = Instant::now();
            // Hard stop at the deadline even if a client implementation
            // fails to honor the timeout it was given.
            let result = match tokio::time::timeout(
                call_timeout,
                client.generate(message, call_timeout),
            )
            .await
            {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Timeout(call_timeout)),
            };
            let latency = start.elapsed();

            match result {
                Ok(text) => {
                    let tokens = ((message.len() + text.len()) / 4) as u64;
                    self.usage
                        .record(AttemptRecord::success(provider, latency, tokens));
                    return Ok(text);
                }
                Err(err) => {
                    self.usage.record(AttemptRecord::failure(
                        provider,
                        outcome_of(&err),
                        latency,
                        err.to_string(),
                    ));
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        provider, attempt, max_attempts, err
                    );

                    let retryable = err.is_retryable();
                    last_err = Some(err);
                    if !retryable || attempt == max_attempts {
                        break;
                    }

                    let delay = jittered(base_backoff(&self.policy, attempt));
                    if let Some(deadline) = deadline {
                        if Instant::now() + delay >= deadline {
                            break;
                        }
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_err.unwrap_or(ProviderError::Timeout(timeout)))
    }
}

/// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
fn base_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    policy.base_delay.saturating_mul(factor).min(policy.max_delay)
}

/// ±20% so concurrent requests don't retry in lockstep.
fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.8..=1.2);
    delay.mul_f64(factor)
}

fn outcome_of(err: &ProviderError) -> AttemptOutcome {
    match err {
        ProviderError::Timeout(_) => AttemptOutcome::Timeout,
        _ => AttemptOutcome::RemoteError,
    }
}

fn clamp_to_deadline(timeout: Duration, deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        None => Some(timeout),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                None
            } else {
                Some(timeout.min(remaining))
            }
        }
    }
}
