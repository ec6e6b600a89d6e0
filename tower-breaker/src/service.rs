use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use shot_breaker::Breaker;
use shot_breaker::Outcome;
use shot_breaker::Reason;

use crate::error::ShotError;
use crate::layer::Acceptable;

pub struct BreakerService<B, S>
where
    B: ?Sized,
{
    inner: S,
    breaker: Arc<B>,
    acceptable: Option<Acceptable>,
}

/// Reports the outcome of an admitted request back to its breaker.
pub struct Recorder<B>
where
    B: Breaker + ?Sized,
{
    breaker: Arc<B>,
    acceptable: Option<Acceptable>,
}

impl<B> Recorder<B>
where
    B: Breaker + ?Sized,
{
    fn finish<T>(self, result: &Result<T, BoxError>) {
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(err) if self.acceptable.as_ref().is_some_and(|accept| accept(err)) => {
                Outcome::Success
            }
            Err(_) => Outcome::Failure,
        };
        self.breaker.record(outcome);
    }
}

/// Records a failure if the inner future panics while being polled.
struct PanicGuard<'a, B>(&'a mut Option<Recorder<B>>)
where
    B: Breaker + ?Sized;

impl<B> Drop for PanicGuard<'_, B>
where
    B: Breaker + ?Sized,
{
    fn drop(&mut self) {
        if std::thread::panicking()
            && let Some(recorder) = self.0.take()
        {
            recorder.breaker.record(Outcome::Failure);
        }
    }
}

pin_project! {
    /// A future that records the inner service's outcome when it completes.
    ///
    /// A shed request has no inner future and resolves immediately to
    /// `ShotError::Unavailable`. Dropping the future before it completes records
    /// nothing.
    pub struct ResponseFuture<F, R> {
        #[pin]
        inner: Option<F>,
        recorder: Option<R>,
    }
}

impl<F, T, B> Future for ResponseFuture<F, Recorder<B>>
where
    F: Future<Output = Result<T, BoxError>>,
    B: Breaker + ?Sized,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let Some(future) = this.inner.as_pin_mut() else {
            return Poll::Ready(Err(Box::new(ShotError::Unavailable)));
        };

        let guard = PanicGuard(this.recorder);
        let result = ready!(future.poll(cx));
        if let Some(recorder) = guard.0.take() {
            recorder.finish(&result);
        }
        Poll::Ready(result)
    }
}

impl<B, S> Clone for BreakerService<B, S>
where
    B: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: Arc::clone(&self.breaker),
            acceptable: self.acceptable.clone(),
        }
    }
}

impl<B, S> std::fmt::Debug for BreakerService<B, S>
where
    B: std::fmt::Debug + ?Sized,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerService")
            .field("inner", &self.inner)
            .field("breaker", &self.breaker)
            .field("acceptable", &self.acceptable.is_some())
            .finish()
    }
}

impl<B, S, Req> Service<Req> for BreakerService<B, S>
where
    B: Breaker + ?Sized,
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future, Recorder<B>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness belongs to the inner service; the breaker decides per call.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        match self.breaker.accept() {
            ControlFlow::Continue(()) => ResponseFuture {
                inner: Some(self.inner.call(req)),
                recorder: Some(Recorder {
                    breaker: Arc::clone(&self.breaker),
                    acceptable: self.acceptable.clone(),
                }),
            },
            ControlFlow::Break(Reason::Overloaded { drop_ratio }) => {
                tracing::debug!(drop_ratio, "request shed by breaker");
                ResponseFuture {
                    inner: None,
                    recorder: None,
                }
            }
        }
    }
}

impl<B, S> BreakerService<B, S>
where
    B: ?Sized,
{
    pub fn new(inner: S, breaker: Arc<B>) -> Self {
        Self::from_parts(inner, breaker, None)
    }

    pub(crate) fn from_parts(inner: S, breaker: Arc<B>, acceptable: Option<Acceptable>) -> Self {
        Self {
            inner,
            breaker,
            acceptable,
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

    /// The breaker shared by every clone of this service.
    pub fn breaker(&self) -> &Arc<B> {
        &self.breaker
    }
}
