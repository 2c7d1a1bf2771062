use std::time::Duration;

pub(crate) const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub(crate) const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_SUCCESS_THRESHOLD: u32 = 1;
pub(crate) const DEFAULT_SLIDING_WINDOW_SIZE: usize = 10;

/// Configuration shared by every breaker a registry creates.
///
/// The defaults give the plain consecutive-failure breaker: five failures in
/// a row open it, one successful trial closes it, and no failure rate is
/// tracked.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    ///
    /// Default: 5
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting a trial call.
    ///
    /// Default: 30 seconds
    #[cfg_attr(feature = "serde", serde(with = "opgate_core::duration_secs"))]
    pub open_timeout: Duration,

    /// Successful trials needed to close a half-open circuit. Trials still run
    /// one at a time.
    ///
    /// Default: 1
    pub success_threshold: u32,

    /// Fraction of failures (`0.0 < rate <= 1.0`) among the last
    /// `sliding_window_size` closed-state outcomes that also opens the
    /// circuit. Only evaluated once the window is full.
    ///
    /// Default: `None` (only consecutive failures count)
    pub failure_rate_threshold: Option<f64>,

    /// Number of outcomes the failure rate is computed over.
    ///
    /// Default: 10
    pub sliding_window_size: usize,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
            ..Self::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Opens the circuit when at least `rate` of the last `window_size`
    /// outcomes failed.
    pub fn with_failure_rate(mut self, rate: f64, window_size: usize) -> Self {
        self.failure_rate_threshold = Some(rate);
        self.sliding_window_size = window_size;
        self
    }

    /// Replaces zero values with the defaults and drops a failure rate
    /// outside `(0, 1]`.
    pub(crate) fn normalized(mut self) -> Self {
        if self.failure_threshold == 0 {
            self.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if self.open_timeout.is_zero() {
            self.open_timeout = DEFAULT_OPEN_TIMEOUT;
        }
        if self.success_threshold == 0 {
            self.success_threshold = DEFAULT_SUCCESS_THRESHOLD;
        }
        if self.sliding_window_size == 0 {
            self.sliding_window_size = DEFAULT_SLIDING_WINDOW_SIZE;
        }
        self.failure_rate_threshold = self
            .failure_rate_threshold
            .filter(|rate| *rate > 0.0 && *rate <= 1.0);
        self
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            failure_rate_threshold: None,
            sliding_window_size: DEFAULT_SLIDING_WINDOW_SIZE,
        }
    }
}
