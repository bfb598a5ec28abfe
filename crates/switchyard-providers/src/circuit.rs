//! Per-account circuit breaker.
//!
//! An account's circuit opens after `threshold` consecutive failures and stays
//! open for the cooldown. The first evaluation after the cooldown closes it
//! again with the failure count reset, letting one request through as a trial.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest cooldown honored. Larger configured values are clamped.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default)]
struct CircuitState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Serializable view of one account's circuit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Account key, `provider/account`.
    pub key: String,
    /// Failures since the last success or reset.
    pub consecutive_failures: u32,
    /// Whether requests are currently skipped.
    pub open: bool,
    /// Milliseconds until the circuit closes, when open.
    pub remaining_ms: Option<u64>,
}

/// Tracks consecutive failures per account key.
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    states: Mutex<HashMap<String, CircuitState>>,
}

impl CircuitBreaker {
    /// Creates a breaker opening after `threshold` failures for `cooldown`.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: cooldown.min(MAX_COOLDOWN),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `key` must be skipped. An expired cooldown resets the circuit.
    pub fn is_open(&self, key: &str) -> bool {
        let mut states = self.states.lock();
        let Some(state) = states.get_mut(key) else {
            return false;
        };
        match state.open_until {
            None => false,
            Some(until) if Instant::now() >= until => {
                *state = CircuitState::default();
                info!(account = key, "Circuit breaker reset, retrying");
                false
            }
            Some(_) => true,
        }
    }

    /// Closes the circuit for `key`.
    pub fn record_success(&self, key: &str) {
        if let Some(state) = self.states.lock().get_mut(key) {
            *state = CircuitState::default();
        }
    }

    /// Counts a failure for `key`. Returns `true` if the circuit is now open.
    pub fn record_failure(&self, key: &str) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(key.to_string()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures >= self.threshold {
            let now = Instant::now();
            state.open_until = Some(now.checked_add(self.cooldown).unwrap_or(now));
            warn!(
                account = key,
                failures = state.consecutive_failures,
                reset_ms = self.cooldown.as_millis() as u64,
                "Circuit breaker open, skipping provider"
            );
            return true;
        }
        false
    }

    /// Consecutive failures currently recorded for `key`.
    pub fn failures(&self, key: &str) -> u32 {
        self.states
            .lock()
            .get(key)
            .map(|s| s.consecutive_failures)
            .unwrap_or(0)
    }

    /// State of every key seen so far, sorted by key. Does not reset expired circuits.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let states = self.states.lock();
        let mut out: Vec<_> = states
            .iter()
            .map(|(key, state)| {
                let remaining = state
                    .open_until
                    .and_then(|until| until.checked_duration_since(now))
                    .filter(|d| !d.is_zero());
                CircuitSnapshot {
                    key: key.clone(),
                    consecutive_failures: state.consecutive_failures,
                    open: remaining.is_some(),
                    remaining_ms: remaining.map(|d| d.as_millis() as u64),
                }
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }
}
