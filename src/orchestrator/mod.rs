// src/orchestrator/mod.rs
// Top-level dispatch coordinator: priority-ordered fallback across providers

pub mod circuit;
pub mod fallback;
pub mod rate_limit;
pub mod retry;
pub mod usage;

pub use circuit::{Admission, CircuitBreaker, CircuitSettings};
pub use fallback::{FallbackResponder, DEFAULT_FALLBACK_RESPONSE};
pub use rate_limit::RateLimiter;
pub use retry::{RetryController, RetryPolicy};
pub use usage::{
    AttemptOutcome, AttemptRecord, UsageRecorder, UsageSnapshot, FALLBACK_PROVIDER,
};

use crate::providers::ProviderClient;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Immutable per-provider configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub model: String,
    /// Lower is tried first.
    pub priority: u32,
    /// Shown in logs and health output; the full credential stays inside the client.
    pub key_prefix: String,
    pub rate_limit_per_minute: u32,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub timeout: Duration,
}

pub struct ProviderEntry {
    pub descriptor: ProviderDescriptor,
    pub client: Arc<dyn ProviderClient>,
    disabled: AtomicBool,
}

impl ProviderEntry {
    pub fn new(descriptor: ProviderDescriptor, client: Arc<dyn ProviderClient>) -> Self {
        Self {
            descriptor,
            client,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Returns true only for the caller that flipped the flag.
    fn disable(&self) -> bool {
        !self.disabled.swap(true, Ordering::Relaxed)
    }
}

/// What one inbound message resolves to.
///
/// `is_fallback` is true exactly when no provider call succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub response: String,
    pub provider: Option<String>,
    pub is_fallback: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub model: String,
    pub priority: u32,
    pub key_prefix: String,
    pub circuit: &'static str,
    pub disabled: bool,
}

/// Routes one message through the provider list in priority order, guarded by
/// the circuit breaker and rate limiter, and falls back to the canned
/// responder when the whole list is exhausted. Provider failures never reach
/// the caller.
pub struct Orchestrator {
    entries: Vec<ProviderEntry>,
    circuit: CircuitBreaker,
    limiter: RateLimiter,
    retry: RetryController,
    usage: Arc<UsageRecorder>,
    fallback: FallbackResponder,
}

impl Orchestrator {
    pub fn new(mut entries: Vec<ProviderEntry>, retry_policy: RetryPolicy) -> Self {
        entries.sort_by_key(|entry| entry.descriptor.priority);

        let usage = Arc::new(UsageRecorder::new(
            entries.iter().map(|entry| entry.descriptor.name.clone()),
        ));
        let circuit = CircuitBreaker::new(entries.iter().map(|entry| {
            (
                entry.descriptor.name.clone(),
                CircuitSettings {
                    failure_threshold: entry.descriptor.failure_threshold,
                    cooldown: entry.descriptor.cooldown,
                },
            )
        }));
        let limiter = RateLimiter::new(
            entries
                .iter()
                .map(|entry| (entry.descriptor.name.clone(), entry.descriptor.rate_limit_per_minute)),
        );
        let retry = RetryController::new(retry_policy, usage.clone());

        if entries.is_empty() {
            warn!("no AI providers configured; every reply will use the canned fallback");
        } else {
            let order: Vec<&str> = entries
                .iter()
                .map(|entry| entry.descriptor.name.as_str())
                .collect();
            info!("provider order: {}", order.join(" -> "));
        }

        Self {
            entries,
            circuit,
            limiter,
            retry,
            usage,
            fallback: FallbackResponder::new(),
        }
    }

    pub async fn handle(&self, message: &str, caller_id: &str) -> OrchestrationResult {
        self.handle_with_deadline(message, caller_id, None).await
    }

    pub async fn handle_with_deadline(
        &self,
        message: &str,
        caller_id: &str,
        deadline: Option<Instant>,
    ) -> OrchestrationResult {
        let started = Instant::now();

        for entry in &self.entries {
            let name = entry.descriptor.name.as_str();

            if entry.is_disabled() {
                debug!("{} disabled for this process, skipping", name);
                continue;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("request deadline exhausted before trying {}", name);
                break;
            }
            if self.circuit.admit(name) == Admission::Rejected {
                self.usage
                    .record(AttemptRecord::skipped(name, AttemptOutcome::CircuitOpen));
                debug!("{} circuit open, skipping", name);
                continue;
            }
            if !self.limiter.allow(name, caller_id) {
                // The circuit admitted the call but it never went out;
                // return the admission so a half-open probe slot frees up.
                self.circuit.release(name);
                self.usage
                    .record(AttemptRecord::skipped(name, AttemptOutcome::RateLimited));
                debug!("{} rate limit reached for caller {}, skipping", name, caller_id);
                continue;
            }

            match self
                .retry
                .call_with_retry(
                    entry.client.as_ref(),
                    message,
                    entry.descriptor.timeout,
                    deadline,
                )
                .await
            {
                Ok(text) => {
                    self.circuit.report(name, true);
                    return OrchestrationResult {
                        response: text,
                        provider: Some(name.to_string()),
                        is_fallback: false,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    };
                }
                Err(err) => {
                    self.circuit.report(name, false);
                    if err.is_auth() && entry.disable() {
                        warn!(
                            "{} credentials rejected; provider disabled until restart",
                            name
                        );
                    }
                    info!("{} unusable ({}), falling through", name, err);
                }
            }
        }

        let response = self.fallback.respond(message).to_string();
        self.usage.record(AttemptRecord::success(
            FALLBACK_PROVIDER,
            Duration::ZERO,
            (message.len() / 4) as u64,
        ));
        OrchestrationResult {
            response,
            provider: None,
            is_fallback: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Read-only counters for monitoring endpoints.
    pub fn usage_snapshot(&self) -> BTreeMap<String, UsageSnapshot> {
        self.usage.snapshot()
    }

    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.entries
            .iter()
            .map(|entry| ProviderHealth {
                name: entry.descriptor.name.clone(),
                model: entry.descriptor.model.clone(),
                priority: entry.descriptor.priority,
                key_prefix: entry.descriptor.key_prefix.clone(),
                circuit: self.circuit.state_name(&entry.descriptor.name),
                disabled: entry.is_disabled(),
            })
            .collect()
    }

    pub fn has_providers(&self) -> bool {
        !self.entries.is_empty()
    }
}
