//! Client-wide rate limiter for opgate.
//!
//! A non-blocking token bucket: [`RateLimiter::allow`] either takes a token
//! or refuses immediately. When the server pushes back (HTTP 429, or 503 with
//! `Retry-After`) the orchestrator calls [`RateLimiter::set_retry_after`] and
//! every call is refused until the window passes.
//!
//! ```rust
//! use opgate_ratelimiter::{RateLimitConfig, RateLimiter};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = RateLimiter::new(RateLimitConfig::new(5.0, 2));
//! assert!(limiter.allow());
//! assert!(limiter.allow());
//! assert!(!limiter.allow());
//!
//! limiter.set_retry_after(Duration::from_secs(30));
//! assert!(limiter.retry_after_remaining() > Duration::ZERO);
//! # }
//! ```

mod config;
mod events;
mod limiter;

pub use config::RateLimitConfig;
pub use events::{RateLimiterEvent, RejectReason, CLIENT_SCOPE};
pub use limiter::RateLimiter;
