use std::time::Duration;

pub(crate) const DEFAULT_MAX_CONCURRENT: usize = 10;
pub(crate) const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5);

/// Configuration shared by every bulkhead a registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BulkheadConfig {
    /// Slots available per scope.
    ///
    /// Default: 10
    pub max_concurrent: usize,

    /// How long a caller waits for a slot.
    ///
    /// `None` waits until a slot frees up or the caller gives up.
    /// `Some(Duration::ZERO)` fails immediately when the bulkhead is full.
    /// Default: 5 seconds
    #[cfg_attr(feature = "serde", serde(with = "opgate_core::duration_secs::option"))]
    pub max_wait: Option<Duration>,
}

impl BulkheadConfig {
    pub fn new(max_concurrent: usize, max_wait: Option<Duration>) -> Self {
        Self {
            max_concurrent,
            max_wait,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub(crate) fn normalized(mut self) -> Self {
        if self.max_concurrent == 0 {
            self.max_concurrent = DEFAULT_MAX_CONCURRENT;
        }
        self
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}
