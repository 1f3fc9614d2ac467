use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::domain::ServiceKind;

use super::circuit::CircuitState;

const FAILURE_DECAY: f64 = 0.5;
const SUCCESS_RECOVERY: f64 = 0.2;
const HALF_OPEN_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct HealthState {
    raw: f64,
    /// Ceiling imposed by circuit state: 0.0 open, 0.5 half-open, 1.0 closed.
    cap: f64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self { raw: 1.0, cap: 1.0 }
    }
}

/// Rolling `[0,1]` health score per (kind, provider). Passive by default:
/// scores move on observed call outcomes, decaying multiplicatively on
/// failure and recovering additively on success.
pub struct HealthMonitor {
    states: RwLock<HashMap<(ServiceKind, String), HealthState>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn score(&self, kind: ServiceKind, provider: &str) -> f64 {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        let state = states
            .get(&(kind, provider.to_string()))
            .copied()
            .unwrap_or_default();
        state.raw.min(state.cap)
    }

    pub fn record_success(&self, kind: ServiceKind, provider: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let state = states.entry((kind, provider.to_string())).or_default();
        state.raw = (state.raw + SUCCESS_RECOVERY).min(1.0);
    }

    pub fn record_failure(&self, kind: ServiceKind, provider: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let state = states.entry((kind, provider.to_string())).or_default();
        state.raw *= FAILURE_DECAY;
        tracing::debug!(kind = %kind, provider, score = state.raw, "Provider health decayed");
    }

    /// Spawn the active probe loop. Off by default; without probes the
    /// monitor works purely from passive call outcomes.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        interval: Duration,
        targets: Vec<ProbeTarget>,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for target in &targets {
                    let healthy = (target.probe)().await;
                    if healthy {
                        monitor.record_success(target.kind, &target.provider);
                    } else {
                        tracing::warn!(
                            kind = %target.kind,
                            provider = %target.provider,
                            "Health probe failed"
                        );
                        monitor.record_failure(target.kind, &target.provider);
                    }
                }
            }
        })
    }

    /// Circuit state changes feed back into the score ceiling.
    pub fn apply_circuit_state(&self, kind: ServiceKind, provider: &str, state: CircuitState) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let entry = states.entry((kind, provider.to_string())).or_default();
        entry.cap = match state {
            CircuitState::Open => 0.0,
            CircuitState::HalfOpen => HALF_OPEN_CAP,
            CircuitState::Closed => 1.0,
        };
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// One provider endpoint checked by the active probe loop.
pub struct ProbeTarget {
    pub kind: ServiceKind,
    pub provider: String,
    pub probe: Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>,
}
