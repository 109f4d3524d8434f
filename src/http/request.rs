//! Request identity and client-address extraction.
//!
//! # Responsibilities
//! - Resolve the per-request correlation id as early as possible
//! - Make the id available to every later stage and to the response
//! - Determine the client address, honoring `X-Forwarded-For` only behind
//!   a trusted proxy
//!
//! # Design Decisions
//! - An inbound `X-Request-ID` is reused so ids survive chained gateways;
//!   otherwise a UUID v4 is generated
//! - The id goes onto the response before any stage that can short-circuit,
//!   so 401/404/429/500 responses carry it too

use std::net::{IpAddr, SocketAddr};

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::proxy::forwarder::X_FORWARDED_FOR;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The resolved correlation id, attached to the request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware resolving the correlation id and echoing it on the response.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// The client address used for rate limiting and logging.
///
/// The immediate socket peer, unless that peer is a trusted proxy, in which
/// case the first `X-Forwarded-For` entry is taken.
pub fn client_ip(trusted_proxies: &[IpAddr], peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    if trusted_proxies.contains(&peer.ip()) {
        if let Some(forwarded) = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
        {
            return forwarded;
        }
    }
    peer.ip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(ip: &str) -> SocketAddr {
        format!("{ip}:50000").parse().unwrap()
    }

    #[test]
    fn untrusted_peer_ignores_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.7"));

        let ip = client_ip(&[], peer("203.0.113.5"), &headers);
        assert_eq!(ip.to_string(), "203.0.113.5");
    }

    #[test]
    fn trusted_peer_uses_first_forwarded_entry() {
        let trusted = vec!["10.0.0.1".parse().unwrap()];
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );

        let ip = client_ip(&trusted, peer("10.0.0.1"), &headers);
        assert_eq!(ip.to_string(), "198.51.100.7");
    }

    #[test]
    fn trusted_peer_with_garbage_header_falls_back() {
        let trusted = vec!["10.0.0.1".parse().unwrap()];
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("not-an-ip"));

        let ip = client_ip(&trusted, peer("10.0.0.1"), &headers);
        assert_eq!(ip.to_string(), "10.0.0.1");
    }
}
