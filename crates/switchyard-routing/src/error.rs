//! Routing-specific error types

use http::StatusCode;
use switchyard_core::{HttpError, ProviderType};
use thiserror::Error;

/// Errors that cross the failover boundary
///
/// Provider failures never surface here: they are recorded as attempts in a
/// [`crate::FailoverResult`]. Only the caller's own cancellation propagates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Caller cancelled while failover was in progress
    #[error("request cancelled while routing to {provider}")]
    Cancelled {
        /// Provider that was in flight (or about to be tried) when cancellation fired
        provider: ProviderType,
    },
}

/// Machine-readable classification of an orchestration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OrchestratorErrorCode {
    /// No registered provider matched the request
    NoProviderAvailable,
    /// Every attempted provider failed
    AllProvidersFailed,
    /// The request itself was malformed
    InvalidRequest,
    /// The request-wide deadline elapsed
    GlobalTimeout,
    /// The caller went away
    Cancelled,
}

/// Errors returned by [`crate::Orchestrator::execute`]
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No provider could be selected for the request
    #[error("no provider available for model `{model}`")]
    NoProviderAvailable { model: String },

    /// Every provider in the failover chain failed
    #[error("all providers failed: {summary}")]
    AllProvidersFailed {
        /// `"<provider>: <error>"` for every failed attempt, joined with `"; "`
        summary: String,
        /// Number of providers that were invoked
        attempts: usize,
    },

    /// Request rejected before routing
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request-wide deadline elapsed before any provider succeeded
    #[error("request timed out after {0:?}")]
    GlobalTimeout(std::time::Duration),

    /// Caller cancelled the request
    #[error(transparent)]
    Cancelled(#[from] RoutingError),
}

impl OrchestratorError {
    /// Classification of this error
    pub const fn code(&self) -> OrchestratorErrorCode {
        match self {
            Self::NoProviderAvailable { .. } => OrchestratorErrorCode::NoProviderAvailable,
            Self::AllProvidersFailed { .. } => OrchestratorErrorCode::AllProvidersFailed,
            Self::InvalidRequest(_) => OrchestratorErrorCode::InvalidRequest,
            Self::GlobalTimeout(_) => OrchestratorErrorCode::GlobalTimeout,
            Self::Cancelled(_) => OrchestratorErrorCode::Cancelled,
        }
    }
}

/// Non-standard status used by proxies when the client closed the connection
const CLIENT_CLOSED_REQUEST: u16 = 499;

impl HttpError for OrchestratorError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoProviderAvailable { .. } | Self::AllProvidersFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::GlobalTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled(_) => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT)
            }
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::NoProviderAvailable { .. } | Self::AllProvidersFailed { .. } => "provider_unavailable_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::GlobalTimeout(_) => "timeout_error",
            Self::Cancelled(_) => "cancelled_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            // Upstream details stay in the logs
            Self::AllProvidersFailed { .. } => "All configured providers are currently unavailable".to_owned(),
            _ => self.to_string(),
        }
    }
}
