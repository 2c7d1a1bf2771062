use opgate_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Scope reported by the client-wide limiter.
pub const CLIENT_SCOPE: &str = "*";

/// Why the limiter refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The server asked the client to back off.
    Cooldown,
    /// The token bucket is empty.
    Exhausted,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Cooldown => "cooldown",
            RejectReason::Exhausted => "exhausted",
        }
    }
}

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A call was refused.
    CallRejected {
        timestamp: Instant,
        reason: RejectReason,
    },
    /// A cooldown window was set.
    CooldownStarted {
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::CallRejected { .. } => "call_rejected",
            RateLimiterEvent::CooldownStarted { .. } => "cooldown_started",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::CallRejected { timestamp, .. }
            | RateLimiterEvent::CooldownStarted { timestamp, .. } => *timestamp,
        }
    }

    fn scope(&self) -> &str {
        CLIENT_SCOPE
    }
}
