//! Cross-origin resource sharing.
//!
//! # Responsibilities
//! - Match the `Origin` header against the configured allow-list
//! - Answer preflight `OPTIONS` requests with 204 before routing
//! - Attach allow headers to matching responses
//!
//! # Design Decisions
//! - `*` in the allow-list matches any origin, but the response always
//!   echoes the concrete origin so credentialed requests keep working
//! - Preflights short-circuit before rate limiting so browsers cannot
//!   consume a client's quota with handshakes
//! - Non-matching origins get no allow headers at all

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::CorsConfig;
use crate::http::server::AppState;

pub async fn cors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let cfg = &state.config.cors;

    let origin = req.headers().get(header::ORIGIN).cloned();
    let allowed = origin
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .map(|o| origin_allowed(cfg, o))
        .unwrap_or(false);
    let preflight = req.method() == Method::OPTIONS;

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if allowed {
        let headers = response.headers_mut();
        if let Some(origin) = origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        if preflight {
            if let Ok(value) = HeaderValue::from_str(&cfg.methods_header()) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
            }
            if let Ok(value) = HeaderValue::from_str(&cfg.headers_header()) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("86400"),
            );
        }
    }

    response
}

fn origin_allowed(cfg: &CorsConfig, origin: &str) -> bool {
    !origin.is_empty()
        && cfg
            .allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_origin_match() {
        let cfg = CorsConfig {
            allowed_origins: vec!["https://app.example".to_string()],
            ..CorsConfig::default()
        };
        assert!(origin_allowed(&cfg, "https://app.example"));
        assert!(!origin_allowed(&cfg, "https://other.example"));
        assert!(!origin_allowed(&cfg, ""));
    }

    #[test]
    fn wildcard_matches_any_origin() {
        let cfg = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            ..CorsConfig::default()
        };
        assert!(origin_allowed(&cfg, "https://anything.example"));
        assert!(!origin_allowed(&cfg, ""));
    }

    #[test]
    fn joined_header_values() {
        let cfg = CorsConfig::default();
        assert!(cfg.methods_header().contains("GET, POST"));
        assert!(cfg.headers_header().contains("Authorization"));
    }
}
