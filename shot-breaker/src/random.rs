use std::fmt::Debug;
use std::sync::Mutex;
use std::sync::PoisonError;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// A source of uniform random floats that is safe to share between threads.
pub trait RandomSource: Debug + Send + Sync {
    /// Returns a value in `[0, 1)`.
    fn float64(&self) -> f64;
}

/// A seeded generator behind its own lock.
///
/// Every breaker owns one of these, so unrelated breakers never contend on a
/// process-wide generator.
#[derive(Debug)]
pub struct LockedRng {
    rng: Mutex<StdRng>,
}

impl LockedRng {
    /// Creates a generator seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Creates a generator with a fixed seed, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for LockedRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for LockedRng {
    #[inline]
    fn float64(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random::<f64>()
    }
}
