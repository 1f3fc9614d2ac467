use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::ServiceKind;

use super::health::HealthMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
    probe_in_flight: bool,
}

impl BreakerEntry {
    fn new(cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            cooldown,
            probe_in_flight: false,
        }
    }
}

/// Per-(kind, provider) circuit breakers. Closed → Open after N
/// consecutive failures; Open → HalfOpen after the cooldown, admitting a
/// single probe; HalfOpen → Closed on success, back to Open with a doubled
/// cooldown on failure. State changes are pushed into the health monitor.
pub struct CircuitRegistry {
    config: CircuitBreakerConfig,
    entries: Mutex<HashMap<(ServiceKind, String), BreakerEntry>>,
    health: Arc<HealthMonitor>,
}

impl CircuitRegistry {
    pub fn new(config: CircuitBreakerConfig, health: Arc<HealthMonitor>) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            health,
        }
    }

    /// Current state, applying the time-based Open → HalfOpen transition.
    pub fn state(&self, kind: ServiceKind, provider: &str) -> CircuitState {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry((kind, provider.to_string()))
            .or_insert_with(|| BreakerEntry::new(self.config.cooldown));
        self.advance(kind, provider, entry);
        entry.state
    }

    pub fn is_open(&self, kind: ServiceKind, provider: &str) -> bool {
        self.state(kind, provider) == CircuitState::Open
    }

    /// Whether a call may go out right now. In half-open state only a
    /// single probe is admitted until its outcome is reported.
    pub fn allow_request(&self, kind: ServiceKind, provider: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry((kind, provider.to_string()))
            .or_insert_with(|| BreakerEntry::new(self.config.cooldown));
        self.advance(kind, provider, entry);
        match entry.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if entry.probe_in_flight {
                    false
                } else {
                    entry.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn on_success(&self, kind: ServiceKind, provider: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry((kind, provider.to_string()))
            .or_insert_with(|| BreakerEntry::new(self.config.cooldown));
        let was = entry.state;
        entry.state = CircuitState::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
        entry.cooldown = self.config.cooldown;
        entry.probe_in_flight = false;
        if was != CircuitState::Closed {
            tracing::info!(kind = %kind, provider, "Circuit closed");
        }
        self.health
            .apply_circuit_state(kind, provider, CircuitState::Closed);
    }

    pub fn on_failure(&self, kind: ServiceKind, provider: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry((kind, provider.to_string()))
            .or_insert_with(|| BreakerEntry::new(self.config.cooldown));
        entry.consecutive_failures += 1;

        match entry.state {
            CircuitState::HalfOpen => {
                // Failed probe: reopen with a doubled cooldown.
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                entry.cooldown = (entry.cooldown * 2).min(self.config.max_cooldown);
                entry.probe_in_flight = false;
                tracing::warn!(
                    kind = %kind,
                    provider,
                    cooldown_secs = entry.cooldown.as_secs(),
                    "Circuit probe failed, reopening"
                );
                self.health
                    .apply_circuit_state(kind, provider, CircuitState::Open);
            }
            CircuitState::Closed if entry.consecutive_failures >= self.config.failure_threshold => {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                tracing::warn!(
                    kind = %kind,
                    provider,
                    failures = entry.consecutive_failures,
                    "Circuit opened"
                );
                self.health
                    .apply_circuit_state(kind, provider, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn advance(&self, kind: ServiceKind, provider: &str, entry: &mut BreakerEntry) {
        if entry.state == CircuitState::Open {
            let elapsed = entry
                .opened_at
                .map(|at| at.elapsed())
                .unwrap_or(Duration::ZERO);
            if elapsed >= entry.cooldown {
                entry.state = CircuitState::HalfOpen;
                entry.probe_in_flight = false;
                tracing::info!(kind = %kind, provider, "Circuit half-open");
                self.health
                    .apply_circuit_state(kind, provider, CircuitState::HalfOpen);
            }
        }
    }
}
