//! Per-scope circuit breaker for opgate.
//!
//! A circuit breaker stops sending calls to an operation that keeps failing,
//! then lets a single trial through once a cool-off has passed.
//!
//! ## States
//!
//! - **Closed**: calls flow; consecutive failures are counted.
//! - **Open**: calls are rejected until `open_timeout` elapses.
//! - **HalfOpen**: exactly one trial call is admitted at a time. Enough
//!   successful trials (`success_threshold`, default 1) close the circuit,
//!   any failure re-opens it, and a neutral outcome hands the trial to the
//!   next caller.
//!
//! Besides consecutive failures, an optional failure rate over a count-based
//! sliding window (`failure_rate_threshold`, `sliding_window_size`) can open
//! the circuit.
//!
//! Which failures count is decided by [`should_trip_circuit`]: server errors,
//! transport errors and unclassified errors do; client errors, local
//! rejections and caller cancellations do not.
//!
//! ## Example
//!
//! ```rust
//! use opgate_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
//! use std::time::Duration;
//!
//! let registry = CircuitBreakerRegistry::new(
//!     CircuitBreakerConfig::default()
//!         .with_failure_threshold(3)
//!         .with_open_timeout(Duration::from_secs(10)),
//! );
//!
//! let breaker = registry.get("Todos.List");
//! assert!(breaker.allow());
//! for _ in 0..3 {
//!     breaker.record_failure();
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow());
//! ```
//!
//! ## Feature flags
//!
//! - `tracing`: log transitions and rejections
//! - `metrics`: `circuitbreaker_transitions_total` and
//!   `circuitbreaker_calls_rejected_total` counters
//! - `serde`: (de)serialize [`CircuitBreakerConfig`]

mod circuit;
mod classifier;
mod config;
mod events;
mod registry;

pub use circuit::{CircuitBreaker, CircuitState, Permission};
pub use classifier::should_trip_circuit;
pub use config::CircuitBreakerConfig;
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;
