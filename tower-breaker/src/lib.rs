//! # Tower Breaker
//!
//! `tower-breaker` puts a [`shot_breaker::Breaker`] in front of any
//! [Tower](https://github.com/tower-rs/tower) service.
//!
//! ## The Layers
//!
//! 1. [`BreakerLayer`]: Consults the breaker on every `call`. Shed requests resolve
//!    immediately to `ShotError::Unavailable` and never reach the inner service;
//!    admitted requests have their outcome recorded when the response future
//!    completes.
//! 2. [`ManagedBreakerLayer`]: A pre-composed stack that adds a per-request
//!    timeout (counted as a failure) and maps every error into [`ShotError`].
//! 3. [`TelemetryBreaker`]: Wraps any breaker and counts successes, drops and
//!    failures with OpenTelemetry counters.
//! 4. [`FallbackLayer`]: Placed outside a breaker, answers shed and failed requests
//!    with a default response.
//!
//! ## Acceptable Errors
//!
//! Some downstream errors say nothing about the dependency's health ("not found").
//! [`BreakerLayer::with_acceptable_errors`] records those as successes while still
//! returning them to the caller.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`ShotError`], allowing automatic conversion
//!   to HTTP status codes (503, 408, 500).

mod error;
mod fallback;
mod layer;
mod managed_layer;
mod service;
mod telemetry;
mod utils;


pub use error::ShotError;
pub use fallback::FallbackFuture;
pub use fallback::FallbackLayer;
pub use fallback::FallbackService;
pub use layer::BreakerLayer;
pub use managed_layer::ManagedBreakerLayer;
pub use service::BreakerService;
pub use service::Recorder;
pub use service::ResponseFuture;
pub use telemetry::TelemetryBreaker;
pub use utils::ServiceBuilderExt;
