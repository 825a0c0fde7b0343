use crate::rate_limit::ceil_secs;
use crate::telemetry::GatewayTelemetry;
use errors::GatewayError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CircuitPhase {
    Closed,
    Open,
    HalfOpen
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitState {
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub is_open: bool,
    /// Set when the cooldown elapsed; the next outcome decides recovery.
    pub trial_pending: bool
}

/// Consecutive-failure circuit breaker guarding the upstream service.
///
/// The Open → Half-Open transition happens lazily in [`check`]; there is no
/// timer. The lock is only held for each read-modify-write, never across an
/// upstream call.
///
/// [`check`]: CircuitBreaker::check
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
    max_failures: u32,
    cooldown: Duration,
    telemetry: Arc<GatewayTelemetry>
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, cooldown: Duration, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self {
            state: Mutex::new(CircuitState::default()),
            max_failures: max_failures.max(1),
            cooldown,
            telemetry
        }
    }

    /// Admits a call, moving an expired Open circuit to Half-Open.
    pub fn check(&self, now: Instant) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if !state.is_open {
            return Ok(());
        }

        let elapsed = state
            .opened_at
            .map_or(self.cooldown, |opened_at| now.saturating_duration_since(opened_at));

        if elapsed >= self.cooldown {
            state.is_open = false;
            state.opened_at = None;
            state.consecutive_failures = 0;
            state.trial_pending = true;
            self.telemetry.record_circuit_half_open();
            tracing::info!("Circuit breaker cooldown elapsed, transitioned to HALF-OPEN");
            return Ok(());
        }

        self.telemetry.record_circuit_rejection();
        Err(GatewayError::Unavailable {
            retry_after_secs: ceil_secs(self.cooldown - elapsed)
        })
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        if state.trial_pending {
            state.trial_pending = false;
            self.telemetry.record_circuit_closed();
            tracing::info!("Circuit breaker closed after successful trial call");
        }
    }

    pub fn record_failure(&self, now: Instant, error: &str) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        tracing::warn!(
            error,
            consecutive_failures = state.consecutive_failures,
            "Upstream failure recorded"
        );

        if state.is_open {
            return;
        }

        if state.trial_pending || state.consecutive_failures >= self.max_failures {
            let reopened = state.trial_pending;
            state.is_open = true;
            state.opened_at = Some(now);
            state.trial_pending = false;
            self.telemetry
                .record_circuit_opened(state.consecutive_failures);
            if reopened {
                tracing::error!("Circuit breaker re-OPENED after failed trial call");
            } else {
                tracing::error!(
                    consecutive_failures = state.consecutive_failures,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Circuit breaker OPENED"
                );
            }
        }
    }

    pub fn phase(&self) -> CircuitPhase {
        let state = self.state.lock();
        if state.is_open {
            CircuitPhase::Open
        } else if state.trial_pending {
            CircuitPhase::HalfOpen
        } else {
            CircuitPhase::Closed
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitState {
        self.state.lock().clone()
    }
}
