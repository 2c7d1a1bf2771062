//! Per-scope concurrency bulkhead for opgate.
//!
//! Each scope (`Service.Operation`) gets its own pool of `max_concurrent`
//! slots, so one slow endpoint cannot take every connection the client has.
//! A caller that finds the pool full waits up to `max_wait` for a slot and
//! stops waiting as soon as its own context is cancelled or times out.
//!
//! ```rust
//! use opgate_bulkhead::{BulkheadConfig, BulkheadRegistry};
//! use opgate_core::CallContext;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), opgate_core::Error> {
//! let registry = BulkheadRegistry::new(
//!     BulkheadConfig::default()
//!         .with_max_concurrent(4)
//!         .with_max_wait(Some(Duration::from_secs(1))),
//! );
//!
//! let bulkhead = registry.get("Todos.List");
//! let permit = bulkhead.acquire(&CallContext::background()).await?;
//! assert_eq!(bulkhead.in_use(), 1);
//! permit.release();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `tracing`: log rejections
//! - `metrics`: `bulkhead_calls_permitted_total`,
//!   `bulkhead_calls_rejected_total` and `bulkhead_concurrent_calls`
//! - `serde`: (de)serialize [`BulkheadConfig`]

mod bulkhead;
mod config;
mod events;
mod registry;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use config::BulkheadConfig;
pub use events::BulkheadEvent;
pub use registry::BulkheadRegistry;
