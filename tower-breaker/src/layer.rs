use std::sync::Arc;

use shot_breaker::Breaker;
use tower::BoxError;
use tower::Layer;

use crate::service::BreakerService;

/// Decides whether a downstream error should still count as a success.
pub(crate) type Acceptable = Arc<dyn Fn(&BoxError) -> bool + Send + Sync>;

/// Applies a circuit breaker to requests.
pub struct BreakerLayer<B>
where
    B: ?Sized,
{
    breaker: Arc<B>,
    acceptable: Option<Acceptable>,
}

impl<B> Clone for BreakerLayer<B>
where
    B: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            breaker: Arc::clone(&self.breaker),
            acceptable: self.acceptable.clone(),
        }
    }
}

impl<B> std::fmt::Debug for BreakerLayer<B>
where
    B: std::fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerLayer")
            .field("breaker", &self.breaker)
            .field("acceptable", &self.acceptable.is_some())
            .finish()
    }
}

impl<B> BreakerLayer<B>
where
    B: Breaker + ?Sized,
{
    /// Create a BreakerLayer
    pub fn new(breaker: Arc<B>) -> Self {
        BreakerLayer {
            breaker,
            acceptable: None,
        }
    }

    /// Treat some downstream errors as successes.
    ///
    /// Errors for which `predicate` returns `true` (e.g. "not found") are recorded
    /// as successes. They are still returned to the caller unchanged.
    pub fn with_acceptable_errors<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.acceptable = Some(Arc::new(predicate));
        self
    }
}

impl<B, S> Layer<S> for BreakerLayer<B>
where
    B: ?Sized,
{
    type Service = BreakerService<B, S>;

    fn layer(&self, service: S) -> Self::Service {
        BreakerService::from_parts(service, self.breaker.clone(), self.acceptable.clone())
    }
}
