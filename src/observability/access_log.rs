//! Per-request access logging.
//!
//! # Responsibilities
//! - Emit exactly one structured line per request, after the response is
//!   final — short-circuits and recovered panics included
//! - Record the correlation id, final status, latency, and any upstream
//!   transport failure
//!
//! # Design Decisions
//! - Outermost layer, so nothing that happens deeper can suppress the line
//! - 5xx responses log at error level, everything else at info

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::UpstreamError;
use crate::http::request::{client_ip, X_REQUEST_ID};
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn access_log(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let client = client_ip(&state.config.trusted_proxies, addr, req.headers());

    let start = Instant::now();
    let response = next.run(req).await;
    let latency = start.elapsed();

    let status = response.status();
    let request_id = response
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let upstream_error = response
        .extensions()
        .get::<UpstreamError>()
        .map(|e| e.0.clone())
        .unwrap_or_default();

    metrics::record_request(method.as_str(), status.as_u16(), latency);

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            query = %query,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            client_ip = %client,
            request_id = %request_id,
            upstream_error = %upstream_error,
            "HTTP request"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            query = %query,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            client_ip = %client,
            request_id = %request_id,
            "HTTP request"
        );
    }

    response
}
