use opgate_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A slot was handed out.
    CallPermitted {
        scope: String,
        timestamp: Instant,
        concurrent_calls: usize,
    },
    /// No slot became free within the wait budget.
    CallRejected {
        scope: String,
        timestamp: Instant,
        max_concurrent: usize,
    },
    /// A slot was given back.
    SlotReleased {
        scope: String,
        timestamp: Instant,
        held_for: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::SlotReleased { .. } => "slot_released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::SlotReleased { timestamp, .. } => *timestamp,
        }
    }

    fn scope(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { scope, .. }
            | BulkheadEvent::CallRejected { scope, .. }
            | BulkheadEvent::SlotReleased { scope, .. } => scope,
        }
    }
}
