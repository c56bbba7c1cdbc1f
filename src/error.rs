// Failure taxonomy for the data gateways. Both implementations convert
// their lower-level failures into this enum at the boundary; nothing above
// the gateway ever sees a transport-library error type.

use thiserror::Error;

/// Errors produced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connectivity failure: DNS, refused connection, timeout, dropped socket.
    #[error("network error: {0}")]
    Transport(String),

    /// The request could not be constructed (bad base URL or path).
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Non-2xx response without a structured error body.
    #[error("HTTP error: {0}")]
    Http(u16),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Server-supplied error message from a structured `{"error": ...}` body.
    #[error("{0}")]
    Api(String),

    /// The requested entity does not exist.
    #[error("no data")]
    NoData,
}

impl GatewayError {
    /// Classify a reqwest failure into the taxonomy.
    pub(crate) fn from_http(err: reqwest::Error) -> Self {
        if err.is_builder() {
            GatewayError::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}
