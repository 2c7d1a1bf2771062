pub(crate) const DEFAULT_REQUESTS_PER_SECOND: f64 = 50.0;
pub(crate) const DEFAULT_BURST_SIZE: u32 = 10;

/// Configuration for the client-wide rate limiter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RateLimitConfig {
    /// Sustained rate the bucket refills at.
    ///
    /// Default: 50
    pub requests_per_second: f64,

    /// Bucket capacity; how many calls may go out back to back.
    ///
    /// Default: 10
    pub burst_size: u32,

    /// Whether server `Retry-After` hints block calls. When off, cooldowns
    /// are ignored and only the bucket applies.
    ///
    /// Default: true
    pub respect_retry_after: bool,
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
            respect_retry_after: true,
        }
    }

    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = rps;
        self
    }

    pub fn with_burst_size(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Replaces zero, negative and non-finite values with the defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            self.requests_per_second = DEFAULT_REQUESTS_PER_SECOND;
        }
        if self.burst_size == 0 {
            self.burst_size = DEFAULT_BURST_SIZE;
        }
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_SECOND, DEFAULT_BURST_SIZE)
    }
}
