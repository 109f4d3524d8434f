//! Request forwarding to upstream services.
//!
//! # Responsibilities
//! - Rebuild the request URI on the target's scheme and authority
//! - Filter hop-by-hop headers in both directions
//! - Inject correlation, client-address, and principal headers
//! - Enforce the upstream deadline and map transport failures to 502
//! - Relay the upstream response without buffering large bodies

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use thiserror::Error;
use url::Url;

use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::security::auth::Principal;
use crate::security::headers::is_hop_by_hop;
use crate::security::limits::bounded_body;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Total deadline for one upstream exchange.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 20;

pub type HttpClient = Client<HttpConnector, Body>;

/// Build the shared pooled client. Created once at startup, closed with the
/// process.
pub fn build_client() -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .build(connector)
}

/// A misconfigured upstream base URL. Startup-time only.
#[derive(Debug, Error)]
#[error("invalid upstream base URL '{url}'")]
pub struct InvalidUpstream {
    url: String,
}

/// Forwards requests to one upstream service.
pub struct Forwarder {
    name: &'static str,
    scheme: Scheme,
    authority: Authority,
    client: HttpClient,
}

impl Forwarder {
    pub fn new(
        name: &'static str,
        base_url: &str,
        client: HttpClient,
    ) -> Result<Self, InvalidUpstream> {
        let invalid = || InvalidUpstream {
            url: base_url.to_string(),
        };

        let url = Url::parse(base_url).map_err(|_| invalid())?;
        let scheme = Scheme::try_from(url.scheme()).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::try_from(authority.as_str()).map_err(|_| invalid())?;

        Ok(Self {
            name,
            scheme,
            authority,
            client,
        })
    }

    /// Forward one request and relay the upstream response.
    pub async fn forward(
        &self,
        req: Request,
        peer_ip: IpAddr,
        principal: &Principal,
        request_id: &str,
        body_cap: Option<usize>,
    ) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();

        let uri = self.upstream_uri(parts.uri.path(), parts.uri.query())?;
        let body = bounded_body(body, body_cap).await?;

        let mut upstream = Request::new(body);
        *upstream.method_mut() = parts.method.clone();
        *upstream.uri_mut() = uri;

        // Copy end-to-end headers. Host and Content-Length are re-derived
        // from the rewritten URI and the forwarded body.
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name) || *name == header::HOST || *name == header::CONTENT_LENGTH {
                continue;
            }
            upstream.headers_mut().append(name.clone(), value.clone());
        }
        apply_forwarding_headers(
            upstream.headers_mut(),
            &parts.headers,
            peer_ip,
            principal,
            request_id,
        );

        tracing::debug!(
            upstream = self.name,
            method = %parts.method,
            uri = %upstream.uri(),
            "Proxying request"
        );

        match tokio::time::timeout(UPSTREAM_TIMEOUT, self.client.request(upstream)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(err)) => {
                tracing::error!(
                    upstream = self.name,
                    error = %err,
                    "Upstream request failed"
                );
                metrics::record_upstream_error(self.name);
                Err(GatewayError::ServiceUnavailable {
                    detail: err.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(upstream = self.name, "Upstream request timed out");
                metrics::record_upstream_error(self.name);
                Err(GatewayError::ServiceUnavailable {
                    detail: format!("request timed out after {}s", UPSTREAM_TIMEOUT.as_secs()),
                })
            }
        }
    }

    /// One-shot reachability probe, logged at startup. Failures are
    /// informational; the gateway starts regardless.
    pub async fn probe_health(&self) {
        let uri = match self.upstream_uri("/health", None) {
            Ok(uri) => uri,
            Err(_) => return,
        };
        let mut req = Request::new(Body::empty());
        *req.method_mut() = Method::GET;
        *req.uri_mut() = uri;

        match tokio::time::timeout(PROBE_TIMEOUT, self.client.request(req)).await {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::info!(upstream = self.name, "Upstream reachable");
            }
            Ok(Ok(response)) => {
                tracing::warn!(
                    upstream = self.name,
                    status = %response.status(),
                    "Upstream health probe returned non-success"
                );
            }
            Ok(Err(err)) => {
                tracing::warn!(upstream = self.name, error = %err, "Upstream unreachable");
            }
            Err(_) => {
                tracing::warn!(upstream = self.name, "Upstream health probe timed out");
            }
        }
    }

    fn upstream_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, GatewayError> {
        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        let path_and_query = PathAndQuery::try_from(path_and_query.as_str())
            .map_err(|_| GatewayError::BadRequest("Invalid request path".to_string()))?;

        let mut parts = axum::http::uri::Parts::default();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = Some(path_and_query);

        Uri::from_parts(parts).map_err(|_| GatewayError::Internal)
    }
}

/// Correlation, client-address, and principal headers on the upstream
/// request. The identity headers overwrite whatever the client sent; the
/// forwarding chain headers compose across hops.
fn apply_forwarding_headers(
    out: &mut HeaderMap,
    inbound: &HeaderMap,
    peer_ip: IpAddr,
    principal: &Principal,
    request_id: &str,
) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        out.insert(X_REQUEST_ID, value);
    }

    // Append this hop to the forwarding chain.
    let forwarded_for = match inbound.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prev) if !prev.is_empty() => format!("{prev}, {peer_ip}"),
        _ => peer_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        out.insert(X_FORWARDED_FOR, value);
    }

    // The first hop's view of the client wins.
    if !inbound.contains_key(X_REAL_IP) {
        if let Ok(value) = HeaderValue::from_str(&peer_ip.to_string()) {
            out.insert(X_REAL_IP, value);
        }
    }

    principal.apply_upstream_headers(out);
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in names {
        headers.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::auth::{fingerprint, X_API_KEY_HASH, X_USER_EMAIL, X_USER_ID, X_USER_ROLE};

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new("identity", base, build_client()).expect("valid base URL")
    }

    #[test]
    fn rejects_invalid_base_urls() {
        for base in ["", "not a url", "http://", "localhost:8081"] {
            assert!(
                Forwarder::new("identity", base, build_client()).is_err(),
                "base: {base:?}"
            );
        }
    }

    #[test]
    fn upstream_uri_preserves_path_and_query() {
        let fwd = forwarder("http://identity:8081");

        let uri = fwd.upstream_uri("/api/v1/auth/login", None).unwrap();
        assert_eq!(uri.to_string(), "http://identity:8081/api/v1/auth/login");

        let uri = fwd
            .upstream_uri("/api/v1/captcha/logs", Some("page=2&limit=50"))
            .unwrap();
        assert_eq!(
            uri.to_string(),
            "http://identity:8081/api/v1/captcha/logs?page=2&limit=50"
        );
    }

    #[test]
    fn default_port_is_left_implicit() {
        let fwd = forwarder("http://identity.internal");
        let uri = fwd.upstream_uri("/health", None).unwrap();
        assert_eq!(uri.to_string(), "http://identity.internal/health");
    }

    #[test]
    fn forwarding_chain_appends_this_hop() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));
        inbound.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.1"));

        let mut out = inbound.clone();
        apply_forwarding_headers(&mut out, &inbound, peer, &Principal::Anonymous, "req-1");

        assert_eq!(
            out.get(X_FORWARDED_FOR).unwrap(),
            "198.51.100.1, 203.0.113.9"
        );
        // The original hop's client survives.
        assert_eq!(out.get(X_REAL_IP).unwrap(), "198.51.100.1");
        assert_eq!(out.get(X_REQUEST_ID).unwrap(), "req-1");
    }

    #[test]
    fn first_hop_sets_both_address_headers() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let inbound = HeaderMap::new();
        let mut out = HeaderMap::new();

        apply_forwarding_headers(&mut out, &inbound, peer, &Principal::Anonymous, "req-2");

        assert_eq!(out.get(X_FORWARDED_FOR).unwrap(), "203.0.113.9");
        assert_eq!(out.get(X_REAL_IP).unwrap(), "203.0.113.9");
    }

    #[test]
    fn bearer_principal_headers_replace_inbound_spoofing() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert(X_USER_ID, HeaderValue::from_static("1"));
        inbound.insert(X_API_KEY_HASH, HeaderValue::from_static("cafe"));

        let mut out = inbound.clone();
        let principal = Principal::Bearer {
            user_id: 77,
            email: "u@example.com".to_string(),
            role: "user".to_string(),
        };
        apply_forwarding_headers(&mut out, &inbound, peer, &principal, "req-3");

        assert_eq!(out.get(X_USER_ID).unwrap(), "77");
        assert_eq!(out.get(X_USER_EMAIL).unwrap(), "u@example.com");
        assert_eq!(out.get(X_USER_ROLE).unwrap(), "user");
        assert!(out.get(X_API_KEY_HASH).is_none());
    }

    #[test]
    fn api_key_principal_forwards_fingerprint_only() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let inbound = HeaderMap::new();
        let mut out = HeaderMap::new();

        let principal = Principal::ApiKey {
            fingerprint: fingerprint("cp_secret"),
        };
        apply_forwarding_headers(&mut out, &inbound, peer, &principal, "req-4");

        assert_eq!(
            out.get(X_API_KEY_HASH).unwrap().to_str().unwrap(),
            hex::encode(fingerprint("cp_secret"))
        );
        assert!(out.get(X_USER_ID).is_none());
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(header::CONTENT_TYPE).is_some());
    }
}
