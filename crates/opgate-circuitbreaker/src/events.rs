use crate::CircuitState;
use opgate_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        scope: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was refused because the circuit is open or a trial is running.
    CallRejected { scope: String, timestamp: Instant },
    /// A success was recorded.
    SuccessRecorded {
        scope: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failure was recorded.
    FailureRecorded {
        scope: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: u32,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn scope(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { scope, .. }
            | CircuitBreakerEvent::CallRejected { scope, .. }
            | CircuitBreakerEvent::SuccessRecorded { scope, .. }
            | CircuitBreakerEvent::FailureRecorded { scope, .. } => scope,
        }
    }
}
