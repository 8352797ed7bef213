use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::types::Operation;

/// Trait for domain errors that can be converted to HTTP responses
///
/// The gateway boundary turns these into a single upstream response,
/// keeping routing errors decoupled from any web framework.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `provider_unavailable_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

/// Errors surfaced by a single provider invocation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider answered with an error status
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status returned by the provider
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Provider did not answer within the allotted time
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or protocol failure before a response was received
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider is throttling us
    #[error("rate limited by provider, retry after {retry_after}s")]
    RateLimited {
        /// Seconds until the provider accepts requests again
        retry_after: u64,
    },

    /// Work was abandoned because cancellation was requested
    #[error("operation cancelled")]
    Cancelled,

    /// Provider cannot serve this kind of request
    #[error("operation not supported: {0}")]
    Unsupported(Operation),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
