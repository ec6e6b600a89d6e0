use std::num::NonZeroUsize;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::ConfigError;
use crate::config::interval_nanos;

/// A single time slice of the rolling window.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Bucket {
    value: f64,
    count: f64,
}

impl Bucket {
    /// Sum of the weights recorded in this bucket.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Number of observations recorded in this bucket.
    pub fn count(&self) -> f64 {
        self.count
    }

    fn add(&mut self, weight: f64) {
        self.value += weight;
        self.count += 1.0;
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.count = 0.0;
    }
}

/// A thread-safe ring of time buckets covering a trailing period of
/// `size * interval`.
///
/// The bucket at `offset` is the one currently filling. Buckets are aged lazily,
/// at the moment of an `add`, so no background timer is needed.
#[derive(Debug)]
pub struct RollingWindow {
    size: usize,
    interval_ns: u64,
    state: RwLock<WindowState>,
    clock: Clock,
    /// A fixed point in time to calculate deltas from.
    anchor: Instant,
}

#[derive(Debug)]
struct WindowState {
    buckets: Box<[Bucket]>,
    offset: usize,
    /// Nanos from anchor, always a multiple of the interval.
    last_bucket_time: u64,
}

impl RollingWindow {
    /// Creates a new `RollingWindow` driven by the real clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] if `interval` is zero, or
    /// [`ConfigError::IntervalTooLarge`] if it does not fit in `u64` nanoseconds.
    pub fn new(size: NonZeroUsize, interval: Duration) -> Result<Self, ConfigError> {
        Self::with_clock(size, interval, Clock::new())
    }

    /// Creates a new `RollingWindow` reading time from `clock`.
    ///
    /// Passing a mocked [`Clock`] allows virtual time to be advanced in tests.
    ///
    /// # Errors
    ///
    /// See [`RollingWindow::new`].
    pub fn with_clock(
        size: NonZeroUsize,
        interval: Duration,
        clock: Clock,
    ) -> Result<Self, ConfigError> {
        interval_nanos(interval)?;
        Ok(Self::from_parts(size, interval, clock))
    }

    /// `interval` must already have passed [`interval_nanos`].
    pub(crate) fn from_parts(size: NonZeroUsize, interval: Duration, clock: Clock) -> Self {
        debug_assert!(interval_nanos(interval).is_ok());
        let anchor = clock.now();
        tracing::debug!(size = size.get(), ?interval, "creating rolling window");

        Self {
            size: size.get(),
            interval_ns: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
            state: RwLock::new(WindowState {
                buckets: vec![Bucket::default(); size.get()].into_boxed_slice(),
                offset: 0,
                last_bucket_time: 0,
            }),
            clock,
            anchor,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns)
    }

    /// Records one observation with the given weight into the current bucket.
    pub fn add(&self, weight: f64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let now = self.now();
        self.advance(&mut state, now);

        let offset = state.offset;
        state.buckets[offset].add(weight);
    }

    /// Visits every bucket that is still inside the window.
    ///
    /// The valid buckets are copied out while the read lock is held and visited
    /// after it is released, so `visit` never blocks writers.
    pub fn reduce<F>(&self, mut visit: F)
    where
        F: FnMut(&Bucket),
    {
        let snapshot: Vec<Bucket> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let span = self.span(&state, self.now());
            if span >= self.size {
                return;
            }
            (span..self.size)
                .map(|i| state.buckets[(state.offset + i) % self.size])
                .collect()
        };

        for bucket in &snapshot {
            visit(bucket);
        }
    }

    /// Totals of all valid buckets.
    ///
    /// Adds the buckets up in place under the read lock, without the copy that
    /// [`RollingWindow::reduce`] makes.
    pub fn sum(&self) -> Bucket {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let span = self.span(&state, self.now());

        let mut total = Bucket::default();
        for i in span..self.size {
            let bucket = &state.buckets[(state.offset + i) % self.size];
            total.value += bucket.value;
            total.count += bucket.count;
        }
        total
    }

    fn now(&self) -> u64 {
        self.clock.now().duration_since(self.anchor).as_nanos() as u64
    }

    /// Number of interval boundaries crossed since the window was last advanced,
    /// capped at `size`.
    fn span(&self, state: &WindowState, now: u64) -> usize {
        let elapsed = now.saturating_sub(state.last_bucket_time);
        (elapsed / self.interval_ns).min(self.size as u64) as usize
    }

    fn advance(&self, state: &mut WindowState, now: u64) {
        let span = self.span(state, now);
        if span == 0 {
            return;
        }
        if span == self.size {
            tracing::trace!(size = self.size, "rolling window fully expired");
        }

        for i in 0..span {
            let idx = (state.offset + i) % self.size;
            state.buckets[idx].reset();
        }
        state.offset = (state.offset + span) % self.size;
        // Align to the interval boundary so drift does not accumulate
        state.last_bucket_time = now - now % self.interval_ns;
    }
}
