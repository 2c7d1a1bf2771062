//! Core infrastructure for opgate.
//!
//! This crate holds what every gate and the hook layer share:
//! - the event system gates report through
//! - the error taxonomy operations end with
//! - the caller context (cancellation, deadline, span)
//! - the per-scope registry gates are looked up in

pub mod context;
#[cfg(feature = "serde")]
pub mod duration_secs;
pub mod error;
pub mod events;
pub mod registry;

pub use context::CallContext;
pub use error::{exit, ApiError, BoxError, ContextError, Error, ErrorCode, Result};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use registry::Registry;
