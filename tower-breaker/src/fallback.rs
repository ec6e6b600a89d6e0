use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Layer;
use tower::Service;

/// Serves a default response instead of an error.
///
/// Place it outside a [`BreakerLayer`](crate::BreakerLayer) or
/// [`ManagedBreakerLayer`](crate::ManagedBreakerLayer): shed requests and failed
/// requests both resolve to a clone of `response`, while the breaker underneath
/// still records the failure.
#[derive(Clone, Debug)]
pub struct FallbackLayer<Rsp> {
    response: Rsp,
}

impl<Rsp> FallbackLayer<Rsp> {
    pub fn new(response: Rsp) -> Self {
        Self { response }
    }
}

impl<S, Rsp> Layer<S> for FallbackLayer<Rsp>
where
    Rsp: Clone,
{
    type Service = FallbackService<S, Rsp>;

    fn layer(&self, inner: S) -> Self::Service {
        FallbackService {
            inner,
            response: self.response.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FallbackService<S, Rsp> {
    inner: S,
    response: Rsp,
}

impl<S, Rsp> FallbackService<S, Rsp> {
    pub fn new(inner: S, response: Rsp) -> Self {
        Self { inner, response }
    }
}

impl<S, Req, Rsp> Service<Req> for FallbackService<S, Rsp>
where
    S: Service<Req, Response = Rsp, Error = BoxError>,
    Rsp: Clone,
{
    type Response = Rsp;
    type Error = BoxError;
    type Future = FallbackFuture<S::Future, Rsp>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness errors are not request failures and pass through.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        FallbackFuture {
            inner: self.inner.call(req),
            response: Some(self.response.clone()),
        }
    }
}

pin_project! {
    pub struct FallbackFuture<F, Rsp> {
        #[pin]
        inner: F,
        response: Option<Rsp>,
    }
}

impl<F, Rsp> Future for FallbackFuture<F, Rsp>
where
    F: Future<Output = Result<Rsp, BoxError>>,
{
    type Output = Result<Rsp, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match ready!(this.inner.poll(cx)) {
            Ok(response) => Poll::Ready(Ok(response)),
            Err(err) => match this.response.take() {
                Some(fallback) => {
                    tracing::debug!(error = %err, "serving fallback response");
                    Poll::Ready(Ok(fallback))
                }
                None => Poll::Ready(Err(err)),
            },
        }
    }
}
