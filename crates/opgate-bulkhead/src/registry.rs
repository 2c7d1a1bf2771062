use crate::{Bulkhead, BulkheadConfig, BulkheadEvent};
use opgate_core::{EventListeners, Registry};
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Lazily creates one [`Bulkhead`] per scope.
#[derive(Debug)]
pub struct BulkheadRegistry {
    config: BulkheadConfig,
    listeners: EventListeners<BulkheadEvent>,
    bulkheads: Registry<Bulkhead>,
}

impl BulkheadRegistry {
    pub fn new(config: BulkheadConfig) -> Self {
        Self::with_listeners(config, EventListeners::new())
    }

    pub fn with_listeners(
        config: BulkheadConfig,
        listeners: EventListeners<BulkheadEvent>,
    ) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "bulkhead_calls_permitted_total",
                    "Total number of calls permitted through the bulkhead"
                );
                describe_counter!(
                    "bulkhead_calls_rejected_total",
                    "Total number of calls rejected by the bulkhead"
                );
                describe_gauge!(
                    "bulkhead_concurrent_calls",
                    "Current number of concurrent calls"
                );
            });
        }

        Self {
            config: config.normalized(),
            listeners,
            bulkheads: Registry::new(),
        }
    }

    /// Returns the bulkhead for `scope`, creating an empty one on first use.
    pub fn get(&self, scope: &str) -> Arc<Bulkhead> {
        self.bulkheads.get_or_insert_with(scope, || {
            Bulkhead::with_listeners(scope, self.config.clone(), self.listeners.clone())
        })
    }

    pub fn peek(&self, scope: &str) -> Option<Arc<Bulkhead>> {
        self.bulkheads.get(scope)
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }
}

impl Default for BulkheadRegistry {
    fn default() -> Self {
        Self::new(BulkheadConfig::default())
    }
}
