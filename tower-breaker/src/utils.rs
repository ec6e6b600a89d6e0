use std::sync::Arc;

use shot_breaker::Breaker;
use tower::ServiceBuilder;
use tower::layer::util::Stack;

use crate::BreakerLayer;
use crate::FallbackLayer;

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Add a circuit breaker layer
    fn circuit_breaker<B>(self, breaker: Arc<B>) -> ServiceBuilder<Stack<BreakerLayer<B>, L>>
    where
        B: Breaker + ?Sized;

    /// Answer failed or shed requests with `response`
    fn fallback<Rsp>(self, response: Rsp) -> ServiceBuilder<Stack<FallbackLayer<Rsp>, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn circuit_breaker<B>(self, breaker: Arc<B>) -> ServiceBuilder<Stack<BreakerLayer<B>, L>>
    where
        B: Breaker + ?Sized,
    {
        self.layer(BreakerLayer::new(breaker))
    }

    fn fallback<Rsp>(self, response: Rsp) -> ServiceBuilder<Stack<FallbackLayer<Rsp>, L>> {
        self.layer(FallbackLayer::new(response))
    }
}
