// src/orchestrator/circuit.rs
// Per-provider failure isolation: Closed -> Open -> HalfOpen state machine

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct CircuitState {
    phase: Phase,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    // In HalfOpen, exactly one caller holds the probe slot at a time.
    probe_in_flight: bool,
    last_failure: Option<Instant>,
    last_probe: Option<Instant>,
}

impl CircuitState {
    fn new() -> Self {
        Self {
            phase: Phase::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            last_failure: None,
            last_probe: None,
        }
    }
}

struct CircuitEntry {
    settings: CircuitSettings,
    state: Mutex<CircuitState>,
}

/// One state machine per provider, created Closed at startup and never
/// destroyed while the process runs. Each provider has its own lock, so
/// unrelated requests never serialize on each other.
pub struct CircuitBreaker {
    circuits: HashMap<String, CircuitEntry>,
}

impl CircuitBreaker {
    pub fn new(providers: impl IntoIterator<Item = (String, CircuitSettings)>) -> Self {
        let circuits = providers
            .into_iter()
            .map(|(name, settings)| {
                (
                    name,
                    CircuitEntry {
                        settings,
                        state: Mutex::new(CircuitState::new()),
                    },
                )
            })
            .collect();
        Self { circuits }
    }

    /// Decide whether a dispatch attempt to `provider` may be made right now.
    pub fn admit(&self, provider: &str) -> Admission {
        let Some(entry) = self.circuits.get(provider) else {
            debug!("admission check for unknown provider '{}'", provider);
            return Admission::Rejected;
        };
        let mut state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);

        match state.phase {
            Phase::Closed => Admission::Allowed,
            Phase::Open => {
                let cooled_down = state
                    .opened_at
                    .map(|at| at.elapsed() >= entry.settings.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    state.phase = Phase::HalfOpen;
                    state.probe_in_flight = true;
                    state.last_probe = Some(Instant::now());
                    debug!("{} circuit half-open, probing", provider);
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
            Phase::HalfOpen => {
                if state.probe_in_flight {
                    Admission::Rejected
                } else {
                    state.probe_in_flight = true;
                    state.last_probe = Some(Instant::now());
                    Admission::Allowed
                }
            }
        }
    }

    /// Give back an admission that was never dispatched (e.g. the rate limiter
    /// denied the call right after the circuit let it through), so a held
    /// probe slot frees up for the next request.
    pub fn release(&self, provider: &str) {
        if let Some(entry) = self.circuits.get(provider) {
            let mut state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.phase == Phase::HalfOpen {
                state.probe_in_flight = false;
            }
        }
    }

    /// Record the final outcome of an admitted attempt. Called exactly once
    /// per admitted dispatch.
    pub fn report(&self, provider: &str, success: bool) {
        let Some(entry) = self.circuits.get(provider) else {
            return;
        };
        let mut state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);

        match state.phase {
            Phase::HalfOpen => {
                state.probe_in_flight = false;
                if success {
                    state.phase = Phase::Closed;
                    state.consecutive_failures = 0;
                    state.opened_at = None;
                    info!("{} circuit closed after successful probe", provider);
                } else {
                    state.phase = Phase::Open;
                    state.opened_at = Some(Instant::now());
                    state.last_failure = Some(Instant::now());
                    warn!("{} circuit reopened after failed probe", provider);
                }
            }
            Phase::Closed => {
                if success {
                    state.consecutive_failures = 0;
                } else {
                    state.consecutive_failures += 1;
                    state.last_failure = Some(Instant::now());
                    if state.consecutive_failures >= entry.settings.failure_threshold {
                        state.phase = Phase::Open;
                        state.opened_at = Some(Instant::now());
                        warn!(
                            "{} circuit opened after {} consecutive failures",
                            provider, state.consecutive_failures
                        );
                    }
                }
            }
            // A late report from an attempt admitted before the circuit
            // opened; the open state already reflects the failure run.
            Phase::Open => {}
        }
    }

    pub fn state_name(&self, provider: &str) -> &'static str {
        let Some(entry) = self.circuits.get(provider) else {
            return "unknown";
        };
        let state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.phase {
            Phase::Closed => "closed",
            Phase::Open => "open",
            Phase::HalfOpen => "half-open",
        }
    }
}
