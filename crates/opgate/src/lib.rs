//! Operation gating for API clients.
//!
//! `opgate` sits between an SDK's operations and its transport. Every
//! operation passes three local gates before any network I/O happens:
//!
//! - a per-scope **circuit breaker** that stops calling a failing operation
//! - a per-scope **bulkhead** that bounds how many calls run at once
//! - a client-wide **rate limiter** that honors server `Retry-After` hints
//!
//! Gates are composed as [`Hooks`], the same observer contract used for
//! logging ([`TracingHooks`]) and metrics (`MetricsHooks`, behind the
//! `metrics` feature), so one chain covers both.
//!
//! # Quick start
//!
//! ```rust
//! use opgate::{run_operation, with_resilience, ChainHooks, Hooks, OperationInfo, TracingHooks};
//! use opgate_core::{CallContext, Error};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Error> {
//! let logging: Arc<dyn Hooks> = Arc::new(TracingHooks::new());
//! let observers = ChainHooks::new(vec![logging]);
//! let hooks = with_resilience(observers, None);
//!
//! let op = OperationInfo::new("Projects", "List").with_resource_type("project");
//! let projects = run_operation(&*hooks, CallContext::background(), &op, |_ctx| async {
//!     // issue HTTP requests here
//!     Ok::<_, Error>(Vec::<String>::new())
//! })
//! .await?;
//! # let _ = projects;
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! Callers that drive operations by hand follow the order documented in
//! [`hooks`]: gate, start, requests, end. The [`Admission`] returned by the
//! gate must reach both start and end; [`run_operation`] and
//! [`OperationLayer`] do this for you.
//!
//! # Feature flags
//!
//! - `tracing`: log gate decisions from the breaker, bulkhead and limiter
//! - `metrics`: `MetricsHooks` plus gate counters and gauges
//! - `serde`: (de)serialize [`ResilienceConfig`]

pub mod chain;
pub mod config;
pub mod hooks;
pub mod layer;
#[cfg(feature = "metrics")]
pub mod metrics_hooks;
pub mod operation;
pub mod release;
pub mod resilience;
pub mod run;
pub mod tracing_hooks;

pub use chain::ChainHooks;
pub use config::ResilienceConfig;
pub use hooks::{Admission, GatingHooks, Hooks, NoopHooks};
pub use layer::{DescribeOperation, OperationLayer, OperationService};
#[cfg(feature = "metrics")]
pub use metrics_hooks::MetricsHooks;
pub use operation::{OperationInfo, RequestInfo, RequestResult};
pub use release::ReleaseTracker;
pub use resilience::{
    with_bulkhead, with_circuit_breaker, with_rate_limit, with_resilience, ResilienceHooks,
    ResilienceHooksBuilder, DEFAULT_RATE_LIMIT_COOLDOWN,
};
pub use run::run_operation;
pub use tracing_hooks::TracingHooks;

pub use opgate_bulkhead::{BulkheadConfig, BulkheadEvent};
pub use opgate_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerEvent, CircuitState};
pub use opgate_core::{ApiError, CallContext, ContextError, Error};
pub use opgate_ratelimiter::{RateLimitConfig, RateLimiterEvent};
