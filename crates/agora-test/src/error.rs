//! Test error types.

use thiserror::Error;

/// Errors raised while building or sending a test request.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body could not be read as requested.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No route matched and the dispatcher left the exchange unanswered.
    #[error("no route for {method} {path}")]
    Unrouted {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The exchange finished without a response.
    #[error("exchange finished without a response")]
    NoResponse,
}
