/// Errors produced by the Tower Breaker middleware stack.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShotError {
    /// The request was shed by the breaker and never reached the inner service.
    ///
    /// When the `axum` feature is enabled, this converts to `503 Service Unavailable`.
    #[error("circuit breaker is open; request shed")]
    Unavailable,

    /// The inner service took longer than the managed stack allows.
    ///
    /// The breaker counts this as a failure of the dependency.
    /// When the `axum` feature is enabled, this converts to `408 Request Timeout`.
    #[error("Request timed out waiting for the inner service")]
    Timeout,

    /// An unexpected error occurred in the inner service.
    ///
    /// The string contains the `Display` representation of the inner error.
    /// When the `axum` feature is enabled, this converts to `500 Internal Server Error`.
    #[error("Internal service error: {0}")]
    Inner(String),
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ShotError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self {
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Inner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
