//! Inbound body size limits.
//!
//! # Responsibilities
//! - Enforce the configured body ceiling before an upstream call
//! - Reject oversized bodies with 413
//!
//! # Design Decisions
//! - With a ceiling configured the body is buffered, so the upstream request
//!   carries an exact `Content-Length`
//! - Without a ceiling the body streams through untouched and the gateway
//!   never buffers unbounded amounts

use axum::body::Body;
use http_body_util::{BodyExt, Limited, LengthLimitError};

use crate::error::GatewayError;

/// Apply the configured ceiling to an inbound body.
///
/// Returns a replacement body: the buffered bytes when a cap is set, the
/// original body untouched otherwise.
pub async fn bounded_body(body: Body, cap: Option<usize>) -> Result<Body, GatewayError> {
    let Some(cap) = cap else {
        return Ok(body);
    };

    match Limited::new(body, cap).collect().await {
        Ok(collected) => Ok(Body::from(collected.to_bytes())),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GatewayError::PayloadTooLarge)
        }
        Err(_) => Err(GatewayError::BadRequest(
            "Failed to read request body".to_string(),
        )),
    }
}
