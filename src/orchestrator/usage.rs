// src/orchestrator/usage.rs
// Per-provider usage metering: lock-free counters read by monitoring

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Reserved provider name the canned responder is metered under.
pub const FALLBACK_PROVIDER: &str = "fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    RemoteError,
    /// Skipped locally before dispatch; not a provider failure.
    RateLimited,
    /// Skipped because the provider's circuit is open; not a provider failure.
    CircuitOpen,
}

/// One dispatch attempt. Produced per call (or per admission denial) and
/// consumed immediately by the recorder; never persisted here.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
    pub tokens_estimate: u64,
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn success(provider: &str, latency: Duration, tokens_estimate: u64) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Success,
            latency,
            tokens_estimate,
            error: None,
        }
    }

    pub fn failure(provider: &str, outcome: AttemptOutcome, latency: Duration, error: String) -> Self {
        Self {
            provider: provider.to_string(),
            outcome,
            latency,
            tokens_estimate: 0,
            error: Some(error),
        }
    }

    /// An admission denial: the provider was never actually called.
    pub fn skipped(provider: &str, outcome: AttemptOutcome) -> Self {
        Self {
            provider: provider.to_string(),
            outcome,
            latency: Duration::ZERO,
            tokens_estimate: 0,
            error: None,
        }
    }
}

#[derive(Default)]
struct ProviderUsage {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejected_rate_limit: AtomicU64,
    rejected_circuit: AtomicU64,
    latency_ms_total: AtomicU64,
    tokens_estimate: AtomicU64,
    last_used_unix_ms: AtomicI64,
}

/// Point-in-time view of one provider's counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejected_rate_limit: u64,
    pub rejected_circuit: u64,
    pub avg_latency_ms: u64,
    pub tokens_estimate: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Counters are monotonic for the process lifetime; `record` never blocks and
/// never fails the surrounding request.
pub struct UsageRecorder {
    stats: HashMap<String, ProviderUsage>,
}

impl UsageRecorder {
    pub fn new(provider_names: impl IntoIterator<Item = String>) -> Self {
        let mut stats: HashMap<String, ProviderUsage> = provider_names
            .into_iter()
            .map(|name| (name, ProviderUsage::default()))
            .collect();
        stats.entry(FALLBACK_PROVIDER.to_string()).or_default();
        Self { stats }
    }

    pub fn record(&self, record: AttemptRecord) {
        let Some(usage) = self.stats.get(&record.provider) else {
            debug!("usage record for unknown provider '{}' dropped", record.provider);
            return;
        };

        usage.requests.fetch_add(1, Ordering::Relaxed);
        match record.outcome {
            AttemptOutcome::Success => {
                usage.successes.fetch_add(1, Ordering::Relaxed);
            }
            AttemptOutcome::Timeout | AttemptOutcome::RemoteError => {
                usage.failures.fetch_add(1, Ordering::Relaxed);
            }
            AttemptOutcome::RateLimited => {
                usage.rejected_rate_limit.fetch_add(1, Ordering::Relaxed);
            }
            AttemptOutcome::CircuitOpen => {
                usage.rejected_circuit.fetch_add(1, Ordering::Relaxed);
            }
        }
        usage
            .latency_ms_total
            .fetch_add(record.latency.as_millis() as u64, Ordering::Relaxed);
        usage
            .tokens_estimate
            .fetch_add(record.tokens_estimate, Ordering::Relaxed);
        usage
            .last_used_unix_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BTreeMap<String, UsageSnapshot> {
        self.stats
            .iter()
            .map(|(name, usage)| {
                let successes = usage.successes.load(Ordering::Relaxed);
                let failures = usage.failures.load(Ordering::Relaxed);
                let dispatched = successes + failures;
                let latency_total = usage.latency_ms_total.load(Ordering::Relaxed);
                let last_used_ms = usage.last_used_unix_ms.load(Ordering::Relaxed);
                let snapshot = UsageSnapshot {
                    requests: usage.requests.load(Ordering::Relaxed),
                    successes,
                    failures,
                    rejected_rate_limit: usage.rejected_rate_limit.load(Ordering::Relaxed),
                    rejected_circuit: usage.rejected_circuit.load(Ordering::Relaxed),
                    avg_latency_ms: latency_total / dispatched.max(1),
                    tokens_estimate: usage.tokens_estimate.load(Ordering::Relaxed),
                    last_used: (last_used_ms != 0)
                        .then(|| Utc.timestamp_millis_opt(last_used_ms).single())
                        .flatten(),
                };
                (name.clone(), snapshot)
            })
            .collect()
    }
}
