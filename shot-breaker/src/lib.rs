//! # shot-breaker
//!
//! `shot-breaker` provides an adaptive, probabilistic circuit breaker based on the
//! client-side throttling formula from the Google SRE book.
//!
//! ## Core Philosophy
//!
//! Classic breakers flip between `Closed`, `Open` and `HalfOpen`. That makes them
//! coarse: a dependency that is 30% broken is either hammered or ignored. This crate
//! instead keeps a rolling window of recent outcomes and rejects each call with a
//! probability derived from recent failure pressure:
//!
//! ```text
//! drop_ratio = (total - k * accepted) / (total + 1)
//! ```
//!
//! ## Key Concepts
//!
//! * **No State Machine**: Every decision is computed from the current window.
//! * **Lazy Aging**: Buckets are expired at the moment of the request, eliminating
//!   the need for background worker threads or timers.
//! * **Breaker Trait**: A unified interface to admit work and record its outcome.
//!
//! ## Example
//!
//! ```rust
//! use shot_breaker::Breaker;
//! use shot_breaker::BreakerError;
//! use shot_breaker::GoogleBreaker;
//!
//! let breaker = GoogleBreaker::new();
//!
//! match breaker.call(|| Ok::<_, std::io::Error>("response")) {
//!     Ok(response) => assert_eq!(response, "response"),
//!     Err(BreakerError::ServiceUnavailable) => { /* shed */ }
//!     Err(BreakerError::Inner(_err)) => { /* downstream failure */ }
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::sync::Arc;

mod config;
mod error;
mod google;
mod random;
mod rolling_window;

pub use config::BreakerConfig;
pub use error::BreakerError;
pub use error::ConfigError;
pub use google::GoogleBreaker;
pub use random::LockedRng;
pub use random::RandomSource;
pub use rolling_window::Bucket;
pub use rolling_window::RollingWindow;

/// Reasons why a call might be rejected by a breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reason {
    /// The call was shed by the probabilistic admission test.
    Overloaded { drop_ratio: f64 },
}

/// The observed result of a unit of work that was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// The weight recorded in the rolling window for this outcome.
    pub fn weight(self) -> f64 {
        match self {
            Outcome::Success => 1.0,
            Outcome::Failure => 0.0,
        }
    }
}

/// The core trait for all breakers.
///
/// Breakers must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Breaker: Debug + Send + Sync {
    /// Decides whether a single call may proceed.
    ///
    /// Nothing is recorded by this method. Callers that admit work must report
    /// its result through [`Breaker::record`].
    fn accept(&self) -> ControlFlow<Reason>;

    /// Records the outcome of a call previously admitted by [`Breaker::accept`].
    fn record(&self, outcome: Outcome);

    /// Admits, executes and records a unit of work.
    ///
    /// `work` runs at most once, synchronously, on the calling thread. If it panics,
    /// a failure is recorded before the panic continues to unwind.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::ServiceUnavailable`] if the call was shed, or
    /// [`BreakerError::Inner`] wrapping the error returned by `work`.
    fn call<F, T, E>(&self, work: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        Self: Sized,
    {
        if self.accept().is_break() {
            return Err(BreakerError::ServiceUnavailable);
        }

        let mut guard = OutcomeGuard {
            breaker: self,
            outcome: Outcome::Failure,
        };
        let result = work();
        if result.is_ok() {
            guard.outcome = Outcome::Success;
        }
        drop(guard);

        result.map_err(BreakerError::Inner)
    }
}

impl<B> Breaker for Arc<B>
where
    B: Breaker + ?Sized,
{
    fn accept(&self) -> ControlFlow<Reason> {
        (**self).accept()
    }

    fn record(&self, outcome: Outcome) {
        (**self).record(outcome)
    }
}

/// Records its outcome when dropped, including while unwinding from a panic in `work`.
struct OutcomeGuard<'a, B: Breaker + ?Sized> {
    breaker: &'a B,
    outcome: Outcome,
}

impl<B: Breaker + ?Sized> Drop for OutcomeGuard<'_, B> {
    fn drop(&mut self) {
        self.breaker.record(self.outcome);
    }
}
