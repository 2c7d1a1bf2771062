use crate::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent};
use opgate_core::{EventListeners, Registry};
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Lazily creates one [`CircuitBreaker`] per scope, all sharing a config and
/// a listener set.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    listeners: EventListeners<CircuitBreakerEvent>,
    breakers: Registry<CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_listeners(config, EventListeners::new())
    }

    pub fn with_listeners(
        config: CircuitBreakerConfig,
        listeners: EventListeners<CircuitBreakerEvent>,
    ) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_counter!(
                    "circuitbreaker_calls_rejected_total",
                    "Total number of calls rejected by an open circuit"
                );
            });
        }

        Self {
            config: config.normalized(),
            listeners,
            breakers: Registry::new(),
        }
    }

    /// Returns the breaker for `scope`, creating a closed one on first use.
    pub fn get(&self, scope: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_insert_with(scope, || {
            CircuitBreaker::with_listeners(scope, self.config.clone(), self.listeners.clone())
        })
    }

    /// Returns the breaker for `scope` only if one was already created.
    pub fn peek(&self, scope: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(scope)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.breakers.scopes()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
