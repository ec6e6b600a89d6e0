use std::num::NonZeroUsize;
use std::time::Duration;

use crate::ConfigError;

pub(crate) const DEFAULT_K: f64 = 1.5;
pub(crate) const DEFAULT_BUCKETS: NonZeroUsize = NonZeroUsize::new(20).unwrap();
pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for a [`GoogleBreaker`](crate::GoogleBreaker).
///
/// The defaults describe a 10 second trailing window made of 20 buckets of 500ms,
/// with a tolerance factor of `1.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    k: f64,
    buckets: usize,
    interval: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            buckets: DEFAULT_BUCKETS.get(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl BreakerConfig {
    /// Set the tolerance factor.
    ///
    /// Higher values tolerate more failures before calls start being shed.
    pub fn with_k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Set the rolling window shape.
    ///
    /// * `buckets` - The number of buckets kept in the window.
    /// * `interval` - The duration covered by each bucket.
    pub fn with_window(mut self, buckets: usize, interval: Duration) -> Self {
        self.buckets = buckets;
        self.interval = interval;
        self
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Checks the configuration, returning the bucket count as a `NonZeroUsize`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub(crate) fn validate(&self) -> Result<NonZeroUsize, ConfigError> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.k));
        }
        interval_nanos(self.interval)?;
        NonZeroUsize::new(self.buckets).ok_or(ConfigError::ZeroBuckets)
    }
}

/// Converts a bucket interval to whole nanoseconds.
///
/// # Errors
///
/// Returns a [`ConfigError`] if `interval` is zero or does not fit in a `u64`.
pub(crate) fn interval_nanos(interval: Duration) -> Result<u64, ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::ZeroInterval(interval));
    }
    u64::try_from(interval.as_nanos()).map_err(|_| ConfigError::IntervalTooLarge(interval))
}
