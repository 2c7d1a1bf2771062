use opgate_bulkhead::BulkheadConfig;
use opgate_circuitbreaker::CircuitBreakerConfig;
use opgate_ratelimiter::RateLimitConfig;

/// Which gates to run and how.
///
/// A `None` field disables that gate. The default enables all three with
/// their default settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResilienceConfig {
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub bulkhead: Option<BulkheadConfig>,
    pub rate_limit: Option<RateLimitConfig>,
}

impl ResilienceConfig {
    /// All gates disabled.
    pub fn disabled() -> Self {
        Self {
            circuit_breaker: None,
            bulkhead: None,
            rate_limit: None,
        }
    }

    pub fn with_circuit_breaker(mut self, config: impl Into<Option<CircuitBreakerConfig>>) -> Self {
        self.circuit_breaker = config.into();
        self
    }

    pub fn with_bulkhead(mut self, config: impl Into<Option<BulkheadConfig>>) -> Self {
        self.bulkhead = config.into();
        self
    }

    pub fn with_rate_limit(mut self, config: impl Into<Option<RateLimitConfig>>) -> Self {
        self.rate_limit = config.into();
        self
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: Some(CircuitBreakerConfig::default()),
            bulkhead: Some(BulkheadConfig::default()),
            rate_limit: Some(RateLimitConfig::default()),
        }
    }
}
