// src/orchestrator/rate_limit.rs
// Per-(provider, caller) admission control backed by keyed rate-limiter cells

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type CallerLimiter = GovRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

// Caller identities are unbounded over the process lifetime; idle cells get
// swept out of the keyed stores on this check cadence.
const SWEEP_EVERY: u64 = 4096;

/// One keyed limiter per provider; the key is the caller identity. `allow`
/// never waits and never errors — denial is an ordinary outcome.
pub struct RateLimiter {
    limiters: HashMap<String, CallerLimiter>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(providers: impl IntoIterator<Item = (String, u32)>) -> Self {
        let limiters = providers
            .into_iter()
            .filter_map(|(name, per_minute)| {
                let quota = Quota::per_minute(NonZeroU32::new(per_minute)?);
                Some((name, GovRateLimiter::keyed(quota)))
            })
            .collect();
        Self {
            limiters,
            checks: AtomicU64::new(0),
        }
    }

    pub fn allow(&self, provider: &str, caller: &str) -> bool {
        self.maybe_sweep();
        match self.limiters.get(provider) {
            Some(limiter) => limiter.check_key(&caller.to_string()).is_ok(),
            None => {
                debug!("no rate limit configured for '{}'", provider);
                true
            }
        }
    }

    fn maybe_sweep(&self) {
        let checks = self.checks.fetch_add(1, Ordering::Relaxed);
        if checks % SWEEP_EVERY == SWEEP_EVERY - 1 {
            for limiter in self.limiters.values() {
                limiter.retain_recent();
                limiter.shrink_to_fit();
            }
        }
    }
}
