use std::ops::ControlFlow;

use quanta::Clock;

use crate::Breaker;
use crate::BreakerConfig;
use crate::ConfigError;
use crate::LockedRng;
use crate::Outcome;
use crate::RandomSource;
use crate::Reason;
use crate::RollingWindow;
use crate::config::DEFAULT_BUCKETS;
use crate::config::DEFAULT_INTERVAL;
use crate::config::DEFAULT_K;

/// Client-side adaptive throttling.
///
/// Requests are rejected with probability
/// `max(0, (total - k * accepted) / (total + 1))`, where `accepted` and `total`
/// are summed over the rolling window. See
/// <https://sre.google/sre-book/handling-overload/#eq2101>.
///
/// There are no discrete open or closed states: every decision is computed from
/// the current window.
#[derive(Debug)]
pub struct GoogleBreaker<R = LockedRng> {
    k: f64,
    window: RollingWindow,
    random: R,
}

impl GoogleBreaker {
    /// Creates a breaker with the default configuration.
    pub fn new() -> Self {
        let window = RollingWindow::from_parts(DEFAULT_BUCKETS, DEFAULT_INTERVAL, Clock::new());
        Self::from_parts(DEFAULT_K, window, LockedRng::new())
    }

    /// Creates a breaker from `config`, driven by the real clock.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn with_config(config: BreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Clock::new())
    }

    /// Creates a breaker from `config` whose window reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn with_clock(config: BreakerConfig, clock: Clock) -> Result<Self, ConfigError> {
        Self::with_random(config, clock, LockedRng::new())
    }
}

impl Default for GoogleBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> GoogleBreaker<R> {
    /// Creates a breaker with an injected random source.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn with_random(config: BreakerConfig, clock: Clock, random: R) -> Result<Self, ConfigError> {
        let buckets = config.validate()?;
        let window = RollingWindow::with_clock(buckets, config.interval(), clock)?;
        Ok(Self::from_parts(config.k(), window, random))
    }

    fn from_parts(k: f64, window: RollingWindow, random: R) -> Self {
        tracing::debug!(
            k,
            buckets = window.size(),
            interval = ?window.interval(),
            "creating breaker"
        );
        Self { k, window, random }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    /// Returns `(accepted, total)` summed over the valid part of the window.
    pub fn history(&self) -> (f64, f64) {
        let totals = self.window.sum();
        (totals.value(), totals.count())
    }

    /// The probability that the next call is shed, before clamping at zero.
    pub fn drop_ratio(&self) -> f64 {
        let (accepted, total) = self.history();
        (total - self.k * accepted) / (total + 1.0)
    }
}

impl<R: RandomSource> Breaker for GoogleBreaker<R> {
    fn accept(&self) -> ControlFlow<Reason> {
        let drop_ratio = self.drop_ratio();
        if drop_ratio <= 0.0 {
            return ControlFlow::Continue(());
        }

        if self.random.float64() < drop_ratio {
            tracing::trace!(drop_ratio, "shedding call");
            ControlFlow::Break(Reason::Overloaded { drop_ratio })
        } else {
            ControlFlow::Continue(())
        }
    }

    #[inline]
    fn record(&self, outcome: Outcome) {
        self.window.add(outcome.weight());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use more_asserts::assert_ge;
    use more_asserts::assert_gt;

    use super::*;
    use crate::BreakerError;

    #[derive(Debug, PartialEq)]
    struct TestError;

    // Always returns the same value and counts how often it was asked
    #[derive(Debug, Default)]
    struct FixedRandom {
        value: f64,
        draws: AtomicUsize,
    }

    impl FixedRandom {
        fn new(value: f64) -> Self {
            Self {
                value,
                draws: AtomicUsize::new(0),
            }
        }
    }

    impl RandomSource for FixedRandom {
        fn float64(&self) -> f64 {
            self.draws.fetch_add(1, Ordering::SeqCst);
            self.value
        }
    }

    fn fixed_breaker(k: f64, value: f64) -> (GoogleBreaker<FixedRandom>, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let config = BreakerConfig::default().with_k(k);
        let breaker = GoogleBreaker::with_random(config, clock, FixedRandom::new(value))
            .expect("valid config");
        (breaker, mock)
    }

    fn mock_breaker(k: f64) -> (GoogleBreaker, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let breaker =
            GoogleBreaker::with_clock(BreakerConfig::default().with_k(k), clock).expect("valid config");
        (breaker, mock)
    }

    #[test]
    fn new_uses_default_config() {
        let breaker = GoogleBreaker::default();
        assert_eq!(breaker.k(), 1.5);
        assert_eq!(breaker.window.size(), 20);
        assert_eq!(breaker.window.interval(), Duration::from_millis(500));
    }

    #[test]
    fn it_passes_inner_errors_through() {
        let (breaker, _mock) = mock_breaker(1.5);
        let res = breaker.call(|| Err::<(), _>(TestError));
        assert_eq!(res, Err(BreakerError::Inner(TestError)));
        assert_eq!(breaker.history(), (0.0, 1.0));
    }

    #[test]
    fn empty_window_always_admits() {
        let (breaker, _mock) = fixed_breaker(0.0, 0.0);
        assert_eq!(breaker.history(), (0.0, 0.0));
        assert!(breaker.accept().is_continue());
        // drop_ratio is exactly zero, so no random draw is needed
        assert_eq!(breaker.random.draws.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successes_keep_drop_ratio_at_zero() {
        let (breaker, _mock) = mock_breaker(1.5);
        for _ in 0..100 {
            assert!(breaker.call(|| Ok::<_, TestError>(())).is_ok());
        }
        assert_eq!(breaker.history(), (100.0, 100.0));
        assert!(breaker.drop_ratio() <= 0.0);

        for _ in 0..100 {
            assert!(breaker.accept().is_continue());
        }
    }

    #[test]
    fn failures_drive_drop_ratio_towards_one() {
        let (breaker, _mock) = fixed_breaker(0.5, 0.5);
        for _ in 0..100 {
            breaker.record(Outcome::Failure);
        }
        assert_eq!(breaker.history(), (0.0, 100.0));
        assert_eq!(breaker.drop_ratio(), 100.0 / 101.0);

        let res = breaker.call(|| Ok::<_, TestError>(()));
        assert_eq!(res, Err(BreakerError::ServiceUnavailable));
        assert_eq!(breaker.history(), (0.0, 100.0));
    }

    #[test]
    fn shed_calls_stop_growing_the_window() {
        let (breaker, _mock) = fixed_breaker(0.5, 0.5);
        for _ in 0..100 {
            let _ = breaker.call(|| Err::<(), _>(TestError));
        }
        // The second call sees a ratio of 1/2, which a draw of 0.5 does not beat.
        // After that the ratio is 2/3 and every call is shed without being recorded.
        assert_eq!(breaker.history(), (0.0, 2.0));
    }

    #[test]
    fn it_sheds_with_high_empirical_frequency() {
        let (breaker, _mock) = mock_breaker(0.5);
        for _ in 0..100 {
            breaker.record(Outcome::Failure);
        }

        let rejected = (0..100)
            .filter(|_| {
                breaker
                    .call(|| Ok::<_, TestError>(()))
                    .is_err_and(|e| e.is_unavailable())
            })
            .count();
        assert_ge!(rejected, 80, "expected most calls to be shed");
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let (breaker, _mock) = fixed_breaker(0.5, 0.0);
        for _ in 0..10 {
            let _ = breaker.call(|| Err::<(), _>(TestError));
        }
        let before = breaker.history();

        let mut ran = false;
        let res = breaker.call(|| {
            ran = true;
            Ok::<_, TestError>(())
        });
        assert!(res.unwrap_err().is_unavailable());
        assert!(!ran);
        assert_eq!(breaker.history(), before);
    }

    #[test]
    fn random_draw_above_ratio_admits() {
        let (breaker, _mock) = fixed_breaker(1.5, 0.99);
        for _ in 0..10 {
            breaker.record(Outcome::Failure);
        }
        // (10 - 0) / 11 < 0.99
        assert!(breaker.accept().is_continue());
        assert_eq!(breaker.random.draws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reason_carries_drop_ratio() {
        let (breaker, _mock) = fixed_breaker(1.0, 0.0);
        for _ in 0..3 {
            breaker.record(Outcome::Failure);
        }
        breaker.record(Outcome::Success);
        // (4 - 1) / 5
        assert_eq!(
            breaker.accept(),
            ControlFlow::Break(Reason::Overloaded { drop_ratio: 0.6 })
        );
    }

    #[test]
    fn it_recovers_once_the_window_expires() {
        let (breaker, mock) = fixed_breaker(0.5, 0.0);
        for _ in 0..100 {
            breaker.record(Outcome::Failure);
        }
        assert!(breaker.accept().is_break());

        // 20 buckets of 500ms
        mock.increment(Duration::from_secs(10));
        assert_eq!(breaker.history(), (0.0, 0.0));
        assert!(breaker.accept().is_continue());
    }

    #[test]
    fn it_records_failure_when_work_panics() {
        let (breaker, _mock) = mock_breaker(1.5);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            breaker.call(|| -> Result<(), TestError> { panic!("downstream blew up") })
        }));
        assert!(res.is_err());
        assert_eq!(breaker.history(), (0.0, 1.0));
    }

    #[test]
    fn it_rejects_invalid_config() {
        let res = GoogleBreaker::with_config(
            BreakerConfig::default().with_window(0, Duration::from_millis(10)),
        );
        assert!(matches!(res, Err(ConfigError::ZeroBuckets)));

        let res = GoogleBreaker::with_config(BreakerConfig::default().with_k(-1.0));
        assert!(matches!(res, Err(ConfigError::InvalidTolerance(_))));

        let huge = Duration::from_secs(u64::MAX / 2);
        let res = GoogleBreaker::with_config(BreakerConfig::default().with_window(2, huge));
        assert!(matches!(res, Err(ConfigError::IntervalTooLarge(d)) if d == huge));
    }

    #[test]
    fn test_breaker_concurrency() {
        use std::thread;

        let (breaker, _mock) = mock_breaker(1.5);
        let breaker = Arc::new(breaker);
        let admitted = Arc::new(AtomicUsize::new(0));
        let shed = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for t in 0..8 {
            let breaker = Arc::clone(&breaker);
            let admitted = Arc::clone(&admitted);
            let shed = Arc::clone(&shed);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let res = breaker.call(|| {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        if (t + i) % 3 == 0 {
                            Err(TestError)
                        } else {
                            Ok(())
                        }
                    });
                    if matches!(res, Err(BreakerError::ServiceUnavailable)) {
                        shed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for h in handles {
            h.join().expect("caller panicked");
        }

        assert_eq!(
            admitted.load(Ordering::SeqCst) + shed.load(Ordering::SeqCst),
            8 * 500
        );

        // Every admitted call was recorded exactly once
        let (accepted, total) = breaker.history();
        assert_eq!(total as usize, admitted.load(Ordering::SeqCst));
        assert_gt!(total, 0.0);
        assert_ge!(total, accepted);
        assert_ge!(accepted, 0.0);
    }
}
