use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::counter;
use opgate_core::EventListeners;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed = 0,
    /// Calls are rejected until the open timeout elapses.
    Open = 1,
    /// A single trial call decides whether to close or re-open.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call got through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The circuit is closed.
    Closed,
    /// The caller holds the half-open trial with this id. Hand it back with
    /// [`CircuitBreaker::record_neutral`] once the call is over.
    Trial(u64),
}

type Transition = (CircuitState, CircuitState);

struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_transition: Instant,
    /// Id of the trial currently in flight.
    trial: Option<u64>,
    last_trial: u64,
    /// Recent closed-state outcomes, `true` for a failure.
    window: VecDeque<bool>,
}

impl Circuit {
    fn grant_trial(&mut self) -> Permission {
        self.last_trial = self.last_trial.wrapping_add(1);
        self.trial = Some(self.last_trial);
        Permission::Trial(self.last_trial)
    }

    fn record_outcome(&mut self, failed: bool, config: &CircuitBreakerConfig) {
        if config.failure_rate_threshold.is_none() {
            return;
        }
        if self.window.len() == config.sliding_window_size {
            self.window.pop_front();
        }
        self.window.push_back(failed);
    }

    fn failure_rate_exceeded(&self, config: &CircuitBreakerConfig) -> bool {
        let Some(threshold) = config.failure_rate_threshold else {
            return false;
        };
        if self.window.len() < config.sliding_window_size {
            return false;
        }
        let failures = self.window.iter().filter(|failed| **failed).count();
        failures as f64 / self.window.len() as f64 >= threshold
    }
}

/// A three-state breaker guarding one scope.
///
/// All reads and transitions happen under one mutex, so two failures racing
/// past the threshold open the circuit exactly once, and an expired open
/// timeout hands out exactly one trial. Listeners run after the mutex is
/// released.
pub struct CircuitBreaker {
    scope: String,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    state_atomic: AtomicU8,
    listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreaker {
    /// Creates a closed breaker. Zero config values fall back to defaults.
    pub fn new(scope: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_listeners(scope, config, EventListeners::new())
    }

    pub fn with_listeners(
        scope: impl Into<String>,
        config: CircuitBreakerConfig,
        listeners: EventListeners<CircuitBreakerEvent>,
    ) -> Self {
        let config = config.normalized();
        Self {
            scope: scope.into(),
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                last_transition: Instant::now(),
                trial: None,
                last_trial: 0,
                window: VecDeque::with_capacity(config.sliding_window_size),
            }),
            config,
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
            listeners,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decides whether a call may proceed.
    ///
    /// Only the admission path should call this: an expired open timeout is
    /// consumed here, turning the breaker half-open and handing the caller
    /// the single trial. Callers that need to give a trial back use
    /// [`try_admit`](Self::try_admit) instead.
    pub fn allow(&self) -> bool {
        self.try_admit().is_some()
    }

    /// Like [`allow`](Self::allow), but says whether the caller holds the
    /// half-open trial, and which one.
    pub fn try_admit(&self) -> Option<Permission> {
        let mut circuit = self.lock();
        let mut transition = None;
        let permission = match circuit.state {
            CircuitState::Closed => Some(Permission::Closed),
            CircuitState::Open => {
                if circuit.last_transition.elapsed() >= self.config.open_timeout {
                    transition = self.transition_to(&mut circuit, CircuitState::HalfOpen);
                    Some(circuit.grant_trial())
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => match circuit.trial {
                Some(_) => None,
                None => Some(circuit.grant_trial()),
            },
        };
        drop(circuit);

        self.announce(transition);
        if permission.is_none() {
            self.reject();
        }
        permission
    }

    /// Records a successful call: resets the failure count, and closes a
    /// half-open circuit once `success_threshold` trials have succeeded.
    ///
    /// Late successes arriving while open are ignored.
    pub fn record_success(&self) {
        let mut circuit = self.lock();
        let mut transition = None;
        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
                circuit.record_outcome(false, &self.config);
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes = circuit.half_open_successes.saturating_add(1);
                if circuit.half_open_successes >= self.config.success_threshold {
                    transition = self.transition_to(&mut circuit, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
        let state = circuit.state;
        drop(circuit);

        self.announce(transition);
        self.listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            scope: self.scope.clone(),
            timestamp: std::time::Instant::now(),
            state,
        });
    }

    /// Records a failed call.
    ///
    /// Opens the circuit once the consecutive count reaches the threshold,
    /// when the configured failure rate is reached over a full window, or
    /// immediately when half-open. A failure arriving while already open
    /// restarts the open timeout.
    pub fn record_failure(&self) {
        let mut circuit = self.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        let failures = circuit.consecutive_failures;

        let mut transition = None;
        match circuit.state {
            CircuitState::Closed => {
                circuit.record_outcome(true, &self.config);
                if failures >= self.config.failure_threshold
                    || circuit.failure_rate_exceeded(&self.config)
                {
                    transition = self.transition_to(&mut circuit, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                transition = self.transition_to(&mut circuit, CircuitState::Open);
            }
            CircuitState::Open => circuit.last_transition = Instant::now(),
        }
        let state = circuit.state;
        drop(circuit);

        self.announce(transition);
        self.listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            scope: self.scope.clone(),
            timestamp: std::time::Instant::now(),
            state,
            consecutive_failures: failures,
        });
    }

    /// Hands back half-open trial `trial` once its call is over.
    ///
    /// Used for calls that ended without saying anything about the
    /// downstream's health (a client error, a cancellation, or a rejection by
    /// a later gate), and after a success that did not yet close the circuit.
    /// Counts are untouched. A trial from an earlier half-open period is
    /// ignored, so a late caller cannot free someone else's trial.
    pub fn record_neutral(&self, trial: u64) {
        let mut circuit = self.lock();
        if circuit.state == CircuitState::HalfOpen && circuit.trial == Some(trial) {
            circuit.trial = None;
        }
    }

    /// Current state, read without taking the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Consecutive failures recorded since the last success or transition.
    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self) {
        self.listeners.emit(&CircuitBreakerEvent::CallRejected {
            scope: self.scope.clone(),
            timestamp: std::time::Instant::now(),
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(scope = %self.scope, "circuit breaker rejected call");

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_rejected_total", "scope" => self.scope.clone())
            .increment(1);
    }

    /// Moves to `to` under the lock. The caller announces the returned
    /// transition once the lock is released.
    fn transition_to(&self, circuit: &mut Circuit, to: CircuitState) -> Option<Transition> {
        let from = circuit.state;
        if from == to {
            return None;
        }

        circuit.state = to;
        circuit.consecutive_failures = 0;
        circuit.half_open_successes = 0;
        circuit.trial = None;
        circuit.window.clear();
        circuit.last_transition = Instant::now();
        self.state_atomic.store(to as u8, Ordering::Release);
        Some((from, to))
    }

    fn announce(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };

        self.listeners.emit(&CircuitBreakerEvent::StateTransition {
            scope: self.scope.clone(),
            timestamp: std::time::Instant::now(),
            from_state: from,
            to_state: to,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(scope = %self.scope, from = %from, to = %to, "circuit state transition");

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_transitions_total",
            "scope" => self.scope.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("scope", &self.scope)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
