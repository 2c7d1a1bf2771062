//! The orchestrator that puts the three gates in front of every operation.

use crate::config::ResilienceConfig;
use crate::hooks::{Admission, GatingHooks, Hooks, NoopHooks};
use crate::operation::{OperationInfo, RequestInfo, RequestResult};
use crate::release::ReleaseTracker;
use futures::future::BoxFuture;
use opgate_bulkhead::{BulkheadConfig, BulkheadEvent, BulkheadRegistry};
use opgate_circuitbreaker::{
    should_trip_circuit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent,
    CircuitBreakerRegistry, CircuitState, Permission,
};
use opgate_core::{CallContext, Error, EventListeners, FnListener};
use opgate_ratelimiter::{RateLimitConfig, RateLimiter, RateLimiterEvent};
use std::sync::Arc;
use std::time::Duration;

/// Cooldown applied on HTTP 429 when the server sends no `Retry-After`.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Gates operations with a circuit breaker, a bulkhead and a rate limiter, in
/// that order, and reports every callback to an inner observer.
///
/// Breakers and bulkheads are per scope (`Service.Operation`); the rate
/// limiter is shared by the whole client. Any of the three can be disabled.
///
/// If the inner observer gates too, its admission call runs after these
/// gates, so stacking [`with_circuit_breaker`] on top of [`with_bulkhead`]
/// runs both.
pub struct ResilienceHooks {
    inner: Arc<dyn Hooks>,
    circuit_breakers: Option<CircuitBreakerRegistry>,
    bulkheads: Option<BulkheadRegistry>,
    rate_limiter: Option<RateLimiter>,
    releases: ReleaseTracker,
}

impl ResilienceHooks {
    /// Builds gates from `config` in front of `inner`.
    pub fn new(inner: Arc<dyn Hooks>, config: ResilienceConfig) -> Self {
        Self::builder().inner(inner).config(config).build()
    }

    pub fn builder() -> ResilienceHooksBuilder {
        ResilienceHooksBuilder::new()
    }

    /// State of the breaker for `scope`, if the breaker is enabled and the
    /// scope has been seen.
    pub fn circuit_state(&self, scope: &str) -> Option<CircuitState> {
        self.circuit_breakers
            .as_ref()
            .and_then(|registry| registry.peek(scope))
            .map(|breaker| breaker.state())
    }

    /// Occupied slots in the bulkhead for `scope`, if the bulkhead is enabled
    /// and the scope has been seen.
    pub fn bulkhead_in_use(&self, scope: &str) -> Option<usize> {
        self.bulkheads
            .as_ref()
            .and_then(|registry| registry.peek(scope))
            .map(|bulkhead| bulkhead.in_use())
    }

    /// Tokens left in the client-wide bucket, if rate limiting is enabled.
    pub fn rate_limiter_tokens(&self) -> Option<f64> {
        self.rate_limiter.as_ref().map(RateLimiter::tokens)
    }

    /// Time left in a server-requested cooldown, if rate limiting is enabled.
    pub fn rate_limiter_cooldown(&self) -> Option<Duration> {
        self.rate_limiter
            .as_ref()
            .map(RateLimiter::retry_after_remaining)
    }

    /// Bulkhead slots taken by the gate and not yet given back.
    pub fn outstanding_releases(&self) -> usize {
        self.releases.outstanding()
    }

    async fn gate(&self, ctx: &CallContext, op: &OperationInfo) -> Result<Admission, Error> {
        let scope = op.scope();

        let mut trial = None;
        if let Some(registry) = &self.circuit_breakers {
            let breaker = registry.get(&scope);
            match breaker.try_admit() {
                Some(Permission::Trial(id)) => {
                    trial = Some(TrialGuard {
                        breaker,
                        trial: id,
                        armed: true,
                    })
                }
                Some(Permission::Closed) => {}
                None => return Err(Error::CircuitOpen),
            }
        }

        let permit = match &self.bulkheads {
            Some(registry) => Some(registry.get(&scope).acquire(ctx).await?),
            None => None,
        };

        if let Some(limiter) = &self.rate_limiter {
            if !limiter.allow() {
                return Err(Error::RateLimited);
            }
        }

        let inner = match self.inner.as_gating() {
            Some(gater) => Some(gater.on_operation_gate(ctx, op).await?),
            None => None,
        };

        // Past this point nothing can fail: hand the slot and the trial over
        // to the admission.
        let release = permit.map(|permit| self.releases.track(permit));
        let trial = trial.map(TrialGuard::keep);
        let admission = Admission::tracked(release, trial);
        Ok(match inner {
            Some(inner) => admission.nest(inner),
            None => admission,
        })
    }

    fn give_back(&self, release: Option<u64>) {
        if let Some(id) = release {
            self.releases.release(id);
        }
    }
}

/// Gives a half-open trial back unless the gate admits the operation.
///
/// Covers every way out of the gate, including the gate future being dropped
/// while it waits for a bulkhead slot.
struct TrialGuard {
    breaker: Arc<CircuitBreaker>,
    trial: u64,
    armed: bool,
}

impl TrialGuard {
    fn keep(mut self) -> u64 {
        self.armed = false;
        self.trial
    }
}

impl Drop for TrialGuard {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.record_neutral(self.trial);
        }
    }
}

impl Hooks for ResilienceHooks {
    fn on_operation_start(
        &self,
        ctx: CallContext,
        op: &OperationInfo,
        admission: &Admission,
    ) -> CallContext {
        let ctx = self.inner.on_operation_start(ctx, op, admission.inner());
        if let Some(id) = admission.release_id() {
            self.releases.activate(id);
        }
        ctx
    }

    fn on_operation_end(
        &self,
        ctx: &CallContext,
        op: &OperationInfo,
        admission: &Admission,
        error: Option<&Error>,
        duration: Duration,
    ) {
        self.give_back(admission.release_id());

        if let Some(registry) = &self.circuit_breakers {
            let breaker = registry.get(&op.scope());
            match error {
                None => breaker.record_success(),
                Some(err) if should_trip_circuit(err) => breaker.record_failure(),
                Some(_) => {}
            }
            // The trial is over whatever the outcome; a stale id is ignored.
            if let Some(trial) = admission.trial() {
                breaker.record_neutral(trial);
            }
        }

        self.inner
            .on_operation_end(ctx, op, admission.inner(), error, duration);
    }

    fn on_request_start(&self, ctx: CallContext, request: &RequestInfo) -> CallContext {
        self.inner.on_request_start(ctx, request)
    }

    fn on_request_end(&self, ctx: &CallContext, request: &RequestInfo, result: &RequestResult) {
        if let Some(limiter) = &self.rate_limiter {
            let retry_after = Duration::from_secs(result.retry_after);
            match result.status_code {
                429 if result.retry_after > 0 => limiter.set_retry_after(retry_after),
                429 => limiter.set_retry_after(DEFAULT_RATE_LIMIT_COOLDOWN),
                // 503 without Retry-After is an outage, not backpressure.
                503 if result.retry_after > 0 => limiter.set_retry_after(retry_after),
                _ => {}
            }
        }

        self.inner.on_request_end(ctx, request, result);
    }

    fn on_retry(&self, ctx: &CallContext, request: &RequestInfo, attempt: u32, error: &Error) {
        self.inner.on_retry(ctx, request, attempt, error);
    }

    fn as_gating(&self) -> Option<&dyn GatingHooks> {
        Some(self)
    }
}

impl GatingHooks for ResilienceHooks {
    fn on_operation_gate<'a>(
        &'a self,
        ctx: &'a CallContext,
        op: &'a OperationInfo,
    ) -> BoxFuture<'a, Result<Admission, Error>> {
        Box::pin(self.gate(ctx, op))
    }
}

impl std::fmt::Debug for ResilienceHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceHooks")
            .field("circuit_breakers", &self.circuit_breakers)
            .field("bulkheads", &self.bulkheads)
            .field("rate_limiter", &self.rate_limiter)
            .field("releases", &self.releases)
            .finish()
    }
}

/// Builder for [`ResilienceHooks`].
///
/// Listeners registered here are shared by every breaker and bulkhead the
/// hooks create, so one callback sees every scope.
pub struct ResilienceHooksBuilder {
    inner: Arc<dyn Hooks>,
    config: ResilienceConfig,
    circuit_breaker_listeners: EventListeners<CircuitBreakerEvent>,
    bulkhead_listeners: EventListeners<BulkheadEvent>,
    rate_limiter_listeners: EventListeners<RateLimiterEvent>,
}

impl ResilienceHooksBuilder {
    /// All three gates with default settings, in front of [`NoopHooks`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NoopHooks),
            config: ResilienceConfig::default(),
            circuit_breaker_listeners: EventListeners::new(),
            bulkhead_listeners: EventListeners::new(),
            rate_limiter_listeners: EventListeners::new(),
        }
    }

    /// Observer that receives every callback after the gates.
    pub fn inner(mut self, inner: Arc<dyn Hooks>) -> Self {
        self.inner = inner;
        self
    }

    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    /// Configures or disables (`None`) the circuit breaker.
    pub fn circuit_breaker(mut self, config: impl Into<Option<CircuitBreakerConfig>>) -> Self {
        self.config.circuit_breaker = config.into();
        self
    }

    /// Configures or disables (`None`) the bulkhead.
    pub fn bulkhead(mut self, config: impl Into<Option<BulkheadConfig>>) -> Self {
        self.config.bulkhead = config.into();
        self
    }

    /// Configures or disables (`None`) the rate limiter.
    pub fn rate_limit(mut self, config: impl Into<Option<RateLimitConfig>>) -> Self {
        self.config.rate_limit = config.into();
        self
    }

    /// Registers a callback for circuit breaker events.
    ///
    /// # Example
    ///
    /// ```rust
    /// use opgate::{CircuitBreakerEvent, ResilienceHooks};
    ///
    /// let hooks = ResilienceHooks::builder()
    ///     .on_circuit_breaker_event(|event| {
    ///         if let CircuitBreakerEvent::StateTransition { scope, to_state, .. } = event {
    ///             println!("{scope} is now {to_state}");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_circuit_breaker_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.circuit_breaker_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback for bulkhead events.
    pub fn on_bulkhead_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BulkheadEvent) + Send + Sync + 'static,
    {
        self.bulkhead_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback for rate limiter events.
    pub fn on_rate_limiter_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimiterEvent) + Send + Sync + 'static,
    {
        self.rate_limiter_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> ResilienceHooks {
        let ResilienceConfig {
            circuit_breaker,
            bulkhead,
            rate_limit,
        } = self.config;

        ResilienceHooks {
            inner: self.inner,
            circuit_breakers: circuit_breaker.map(|config| {
                CircuitBreakerRegistry::with_listeners(config, self.circuit_breaker_listeners)
            }),
            bulkheads: bulkhead
                .map(|config| BulkheadRegistry::with_listeners(config, self.bulkhead_listeners)),
            rate_limiter: rate_limit
                .map(|config| RateLimiter::with_listeners(config, self.rate_limiter_listeners)),
            releases: ReleaseTracker::new(),
        }
    }
}

impl Default for ResilienceHooksBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `inner` with all three gates. `None` uses the default config.
pub fn with_resilience(
    inner: Arc<dyn Hooks>,
    config: Option<ResilienceConfig>,
) -> Arc<ResilienceHooks> {
    Arc::new(ResilienceHooks::new(inner, config.unwrap_or_default()))
}

/// Wraps `inner` with only a circuit breaker. `None` uses the default config.
pub fn with_circuit_breaker(
    inner: Arc<dyn Hooks>,
    config: Option<CircuitBreakerConfig>,
) -> Arc<ResilienceHooks> {
    let config = ResilienceConfig::disabled().with_circuit_breaker(config.unwrap_or_default());
    Arc::new(ResilienceHooks::new(inner, config))
}

/// Wraps `inner` with only a bulkhead. `None` uses the default config.
pub fn with_bulkhead(
    inner: Arc<dyn Hooks>,
    config: Option<BulkheadConfig>,
) -> Arc<ResilienceHooks> {
    let config = ResilienceConfig::disabled().with_bulkhead(config.unwrap_or_default());
    Arc::new(ResilienceHooks::new(inner, config))
}

/// Wraps `inner` with only a rate limiter. `None` uses the default config.
pub fn with_rate_limit(
    inner: Arc<dyn Hooks>,
    config: Option<RateLimitConfig>,
) -> Arc<ResilienceHooks> {
    let config = ResilienceConfig::disabled().with_rate_limit(config.unwrap_or_default());
    Arc::new(ResilienceHooks::new(inner, config))
}
