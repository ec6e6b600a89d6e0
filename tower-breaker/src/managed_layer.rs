use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use shot_breaker::Breaker;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::timeout::Timeout;
use tower::util::BoxCloneSyncService;

use crate::BreakerService;
use crate::ShotError;
use crate::layer::Acceptable;

/// A pre-composed breaker stack with a per-request deadline.
///
/// The breaker sits *outside* the timeout, so a request that takes longer than
/// `timeout` is recorded as a failure of the dependency.
///
/// ### Error Responsibilities:
/// - **Shedding (`ShotError::Unavailable`)**: The breaker rejected the request
///   before it reached the inner service.
/// - **Timeout (`ShotError::Timeout`)**: The *inner service* took too long to
///   respond (e.g., a slow database query).
/// - **Inner (`ShotError::Inner`)**: Any other error of the inner service.
pub struct ManagedBreakerLayer<B, Req>
where
    B: ?Sized,
{
    breaker: Arc<B>,
    timeout: Duration,
    acceptable: Option<Acceptable>,
    _phantom: PhantomData<fn(Req)>,
}

// Note: Deriving Clone would require `Req: Clone`.
impl<B, Req> Clone for ManagedBreakerLayer<B, Req>
where
    B: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            timeout: self.timeout,
            acceptable: self.acceptable.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, B, Req> Layer<S> for ManagedBreakerLayer<B, Req>
where
    B: Breaker + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: 'static,
    Req: Send + 'static,
{
    type Service = BoxCloneSyncService<Req, S::Response, BoxError>;

    fn layer(&self, inner: S) -> Self::Service {
        let guarded = BreakerService::from_parts(
            Timeout::new(inner, self.timeout),
            self.breaker.clone(),
            self.acceptable.clone(),
        );

        // Map the mixed errors into ShotError
        let svc = tower::ServiceBuilder::new()
            .map_err(|err: BoxError| {
                if err.is::<tower::timeout::error::Elapsed>() {
                    BoxError::from(ShotError::Timeout)
                } else if err.is::<ShotError>() {
                    err
                } else {
                    // Wrap any other inner service errors
                    Box::from(ShotError::Inner(err.to_string()))
                }
            })
            .service(guarded);

        BoxCloneSyncService::new(svc)
    }
}

impl<B, Req> ManagedBreakerLayer<B, Req>
where
    B: Breaker + ?Sized,
{
    pub fn new(breaker: Arc<B>, timeout: Duration) -> Self {
        Self {
            breaker,
            timeout,
            acceptable: None,
            _phantom: PhantomData,
        }
    }

    /// See [`BreakerLayer::with_acceptable_errors`](crate::BreakerLayer::with_acceptable_errors).
    pub fn with_acceptable_errors<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.acceptable = Some(Arc::new(predicate));
        self
    }
}
