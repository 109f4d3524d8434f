//! Error taxonomy for the gateway.
//!
//! Every error the gateway emits on the wire maps to one of these kinds and
//! renders as `{"error": "<kind>", "message": "<human readable>"}`. Upstream
//! failures carry their transport detail out-of-band (response extension) so
//! the access log can record it without leaking it to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;

/// Transport-level detail of a failed upstream call, attached to the 502
/// response as an extension for the access log.
#[derive(Debug, Clone)]
pub struct UpstreamError(pub String);

/// All client-visible failure modes of the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Validation failure within the gateway itself.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, malformed, or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// No route matches the request.
    #[error("The requested resource was not found")]
    NotFound,

    /// Inbound body exceeds the configured ceiling.
    #[error("Request body exceeds the allowed size")]
    PayloadTooLarge,

    /// Client is over its window allowance.
    #[error("Too many requests, please try again later")]
    RateLimitExceeded,

    /// Unexpected local failure.
    #[error("Internal server error")]
    Internal,

    /// Upstream dial, read, or timeout failure.
    #[error("Backend service is unavailable")]
    ServiceUnavailable { detail: String },
}

impl GatewayError {
    /// Stable wire identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound => "not_found",
            Self::PayloadTooLarge => "payload_too_large",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::Internal => "internal_error",
            Self::ServiceUnavailable { .. } => "service_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.to_string();
        let mut response = error_response(status, kind, message);
        if let GatewayError::ServiceUnavailable { detail } = self {
            response.extensions_mut().insert(UpstreamError(detail));
        }
        response
    }
}
