use crate::config::BulkheadConfig;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use opgate_core::{CallContext, Error, EventListeners};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

struct Shared {
    scope: String,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    listeners: EventListeners<BulkheadEvent>,
}

impl Shared {
    fn in_use(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.semaphore.available_permits())
    }

    #[cfg(feature = "metrics")]
    fn record_occupancy(&self) {
        gauge!("bulkhead_concurrent_calls", "scope" => self.scope.clone())
            .set(self.in_use() as f64);
    }
}

/// Bounded pool of concurrency slots for one scope.
pub struct Bulkhead {
    shared: Arc<Shared>,
    max_wait: Option<std::time::Duration>,
}

impl Bulkhead {
    pub fn new(scope: impl Into<String>, config: BulkheadConfig) -> Self {
        Self::with_listeners(scope, config, EventListeners::new())
    }

    pub fn with_listeners(
        scope: impl Into<String>,
        config: BulkheadConfig,
        listeners: EventListeners<BulkheadEvent>,
    ) -> Self {
        let config = config.normalized();
        Self {
            shared: Arc::new(Shared {
                scope: scope.into(),
                max_concurrent: config.max_concurrent,
                semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
                listeners,
            }),
            max_wait: config.max_wait,
        }
    }

    pub fn scope(&self) -> &str {
        &self.shared.scope
    }

    /// Takes a slot, waiting for one if the bulkhead is full.
    ///
    /// The wait ends at whichever comes first: a slot frees up, `max_wait`
    /// elapses (`Error::BulkheadFull`), or the caller's context is cancelled
    /// or times out (`Error::Context` with the context's own reason). A
    /// context that is already done fails before any slot is taken.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<BulkheadPermit, Error> {
        if let Some(reason) = ctx.err() {
            return Err(Error::Context(reason));
        }

        if let Some(permit) = self.try_acquire() {
            return Ok(permit);
        }

        let semaphore = Arc::clone(&self.shared.semaphore);
        let max_wait = self.max_wait;
        let wait = async move {
            match max_wait {
                Some(max_wait) if max_wait.is_zero() => None,
                Some(max_wait) => tokio::time::timeout(max_wait, semaphore.acquire_owned())
                    .await
                    .ok()
                    .and_then(Result::ok),
                None => semaphore.acquire_owned().await.ok(),
            }
        };

        tokio::select! {
            biased;
            reason = ctx.done() => Err(Error::Context(reason)),
            permit = wait => match permit {
                Some(permit) => Ok(self.permitted(permit)),
                None => {
                    self.rejected();
                    Err(Error::BulkheadFull)
                }
            },
        }
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        Arc::clone(&self.shared.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.permitted(permit))
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.shared.semaphore.available_permits()
    }

    /// Occupied slots.
    pub fn in_use(&self) -> usize {
        self.shared.in_use()
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    fn permitted(&self, permit: OwnedSemaphorePermit) -> BulkheadPermit {
        let concurrent_calls = self.shared.in_use();
        self.shared.listeners.emit(&BulkheadEvent::CallPermitted {
            scope: self.shared.scope.clone(),
            timestamp: std::time::Instant::now(),
            concurrent_calls,
        });

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "scope" => self.shared.scope.clone())
                .increment(1);
            self.shared.record_occupancy();
        }

        BulkheadPermit {
            permit: Some(permit),
            shared: Arc::clone(&self.shared),
            acquired_at: Instant::now(),
        }
    }

    fn rejected(&self) {
        self.shared.listeners.emit(&BulkheadEvent::CallRejected {
            scope: self.shared.scope.clone(),
            timestamp: std::time::Instant::now(),
            max_concurrent: self.shared.max_concurrent,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            scope = %self.shared.scope,
            max_concurrent = self.shared.max_concurrent,
            "bulkhead full"
        );

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_rejected_total", "scope" => self.shared.scope.clone())
            .increment(1);
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("scope", &self.shared.scope)
            .field("max_concurrent", &self.shared.max_concurrent)
            .field("in_use", &self.in_use())
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

/// One occupied bulkhead slot.
///
/// The slot is freed exactly once, when the permit is released or dropped.
#[must_use = "dropping the permit frees the slot immediately"]
pub struct BulkheadPermit {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<Shared>,
    acquired_at: Instant,
}

impl BulkheadPermit {
    /// Frees the slot.
    pub fn release(self) {
        drop(self);
    }

    pub fn scope(&self) -> &str {
        &self.shared.scope
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            drop(permit);

            self.shared.listeners.emit(&BulkheadEvent::SlotReleased {
                scope: self.shared.scope.clone(),
                timestamp: std::time::Instant::now(),
                held_for: self.acquired_at.elapsed(),
            });

            #[cfg(feature = "metrics")]
            self.shared.record_occupancy();
        }
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("scope", &self.shared.scope)
            .finish()
    }
}
