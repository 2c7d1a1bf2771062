use crate::config::RateLimitConfig;
use crate::events::{RateLimiterEvent, RejectReason};
#[cfg(feature = "metrics")]
use metrics::counter;
use opgate_core::EventListeners;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Stand-in deadline for a cooldown too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Client-wide token bucket that also honours server backpressure.
///
/// `allow` never waits: it answers from the bucket and the cooldown window
/// under a single lock.
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
    listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiter {
    /// Creates a limiter with a full bucket.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_listeners(config, EventListeners::new())
    }

    pub fn with_listeners(
        config: RateLimitConfig,
        listeners: EventListeners<RateLimiterEvent>,
    ) -> Self {
        let config = config.normalized();
        Self {
            bucket: Mutex::new(Bucket {
                tokens: f64::from(config.burst_size),
                last_refill: Instant::now(),
                cooldown_until: None,
            }),
            config,
            listeners,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Takes one token if the limiter is not cooling down and the bucket is
    /// not empty.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut bucket = self.lock();

        if bucket.cooldown_until.is_some_and(|until| now < until) {
            drop(bucket);
            self.reject(RejectReason::Cooldown);
            return false;
        }

        bucket.refill(
            now,
            self.config.requests_per_second,
            f64::from(self.config.burst_size),
        );
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return true;
        }

        drop(bucket);
        self.reject(RejectReason::Exhausted);
        false
    }

    /// Blocks every call for `duration` from now.
    ///
    /// The most recent call wins, even if it shortens an existing cooldown.
    /// A duration past what the clock can represent blocks for decades.
    /// Does nothing when `respect_retry_after` is off.
    pub fn set_retry_after(&self, duration: Duration) {
        if !self.config.respect_retry_after {
            return;
        }

        let now = Instant::now();
        let until = now
            .checked_add(duration)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.lock().cooldown_until = Some(until);

        self.listeners.emit(&RateLimiterEvent::CooldownStarted {
            timestamp: std::time::Instant::now(),
            duration,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(cooldown_secs = duration.as_secs_f64(), "rate limiter cooling down");

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_cooldowns_total").increment(1);
    }

    /// Tokens currently in the bucket, counting refill since the last call.
    pub fn tokens(&self) -> f64 {
        let bucket = self.lock();
        let elapsed = Instant::now()
            .saturating_duration_since(bucket.last_refill)
            .as_secs_f64();
        (bucket.tokens + elapsed * self.config.requests_per_second)
            .min(f64::from(self.config.burst_size))
    }

    /// Time left in the current cooldown, zero if none.
    pub fn retry_after_remaining(&self) -> Duration {
        self.lock()
            .cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, reason: RejectReason) {
        self.listeners.emit(&RateLimiterEvent::CallRejected {
            timestamp: std::time::Instant::now(),
            reason,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(reason = reason.as_str(), "rate limiter rejected call");

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_calls_rejected_total", "reason" => reason.as_str()).increment(1);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tokens", &self.tokens())
            .finish()
    }
}
