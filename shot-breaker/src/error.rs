use std::time::Duration;

/// Errors returned by [`Breaker::call`](crate::Breaker::call).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BreakerError<E> {
    /// The call was shed before the work was executed.
    ///
    /// Nothing is recorded for a shed call; it reflects the caller's view of the
    /// dependency, not the dependency's health.
    #[error("circuit breaker is open")]
    ServiceUnavailable,

    /// The work ran and returned this error. It is passed through untouched.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was shed by the breaker.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }

    /// Returns the downstream error, if the work actually ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::ServiceUnavailable => None,
            Self::Inner(err) => Some(err),
        }
    }
}

/// Invalid breaker or window configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("rolling window must have at least one bucket")]
    ZeroBuckets,

    #[error("bucket interval must be greater than zero, got {0:?}")]
    ZeroInterval(Duration),

    #[error("bucket interval must fit in u64 nanoseconds, got {0:?}")]
    IntervalTooLarge(Duration),

    #[error("tolerance factor must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
}
