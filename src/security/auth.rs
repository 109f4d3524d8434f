//! Authentication middleware and principal handling.
//!
//! # Responsibilities
//! - Enforce each route's authentication policy
//! - Verify bearer tokens against the shared HMAC secret
//! - Fingerprint API keys for delegated validation downstream
//! - Attach the resulting `Principal` to the request
//!
//! # Design Decisions
//! - Only symmetric HMAC algorithms are accepted; `alg: none` and asymmetric
//!   tokens are rejected even when otherwise well-formed
//! - `exp` must be strictly greater than now; `nbf`, when present, must not
//!   be in the future. Both are checked manually for exact boundaries
//! - API keys are never validated here: the identity service owns the key
//!   store, the gateway forwards a SHA-256 fingerprint for it to check

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::routing::{AuthPolicy, MatchedRoute};

pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
pub const X_API_KEY_HASH: HeaderName = HeaderName::from_static("x-api-key-hash");
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// How many leading characters of an API key may appear in logs.
const KEY_DISPLAY_PREFIX_LEN: usize = 11;

/// The authenticated identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Bearer {
        user_id: u64,
        email: String,
        role: String,
    },
    ApiKey {
        fingerprint: [u8; 32],
    },
}

impl Principal {
    /// Write this principal's upstream headers, overwriting anything the
    /// client sent. All identity headers are stripped first so an anonymous
    /// request cannot smuggle `X-User-*` values through the gateway.
    pub fn apply_upstream_headers(&self, headers: &mut HeaderMap) {
        headers.remove(X_USER_ID);
        headers.remove(X_USER_EMAIL);
        headers.remove(X_USER_ROLE);
        headers.remove(X_API_KEY_HASH);

        match self {
            Self::Anonymous => {}
            Self::Bearer {
                user_id,
                email,
                role,
            } => {
                headers.insert(X_USER_ID, HeaderValue::from(*user_id));
                if let Ok(value) = HeaderValue::from_str(email) {
                    headers.insert(X_USER_EMAIL, value);
                }
                if let Ok(value) = HeaderValue::from_str(role) {
                    headers.insert(X_USER_ROLE, value);
                }
            }
            Self::ApiKey { fingerprint } => {
                if let Ok(value) = HeaderValue::from_str(&hex::encode(fingerprint)) {
                    headers.insert(X_API_KEY_HASH, value);
                }
            }
        }
    }
}

/// Bearer-token verification failures, mapped 1:1 to wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingHeader,
    #[error("Invalid authorization header format")]
    MalformedHeader,
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        GatewayError::Unauthorized(err.to_string())
    }
}

/// Access-token claims issued by the identity service.
#[derive(Debug, PartialEq, Deserialize)]
struct Claims {
    user_id: u64,
    email: String,
    role: String,
    exp: u64,
    nbf: Option<u64>,
}

/// Middleware enforcing the matched route's authentication policy.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(MatchedRoute(route)) = req.extensions().get::<MatchedRoute>().copied() else {
        // Route resolution always runs first; reaching here is a wiring bug.
        tracing::error!("Authenticator invoked without a matched route");
        return GatewayError::Internal.into_response();
    };

    let principal = match route.policy {
        AuthPolicy::Open => Principal::Anonymous,
        AuthPolicy::BearerRequired => match bearer_principal(&req, &state.config.jwt.secret) {
            Ok(principal) => principal,
            Err(err) => return GatewayError::from(err).into_response(),
        },
        AuthPolicy::BearerOrApiKey => {
            let api_key = req
                .headers()
                .get(X_API_KEY)
                .and_then(|v| v.to_str().ok())
                .filter(|k| !k.is_empty())
                .map(str::to_owned);
            match api_key {
                Some(key) => {
                    tracing::debug!(
                        key_prefix = display_prefix(&key),
                        "Request authenticated with API key"
                    );
                    Principal::ApiKey {
                        fingerprint: fingerprint(&key),
                    }
                }
                None => match bearer_principal(&req, &state.config.jwt.secret) {
                    Ok(principal) => principal,
                    Err(err) => return GatewayError::from(err).into_response(),
                },
            }
        }
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn bearer_principal(req: &Request, secret: &str) -> Result<Principal, AuthError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    let token = parse_bearer(header)?;
    let claims = verify_bearer_token(token, secret.as_bytes())?;

    Ok(Principal::Bearer {
        user_id: claims.user_id,
        email: claims.email,
        role: claims.role,
    })
}

/// Split `Bearer <token>`: exactly two tokens, scheme case-insensitive.
fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Verify an access token's signature and claims.
fn verify_bearer_token(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
    if !HMAC_ALGORITHMS.contains(&header.alg) {
        return Err(AuthError::InvalidToken);
    }

    // jsonwebtoken treats exp == now as valid; the boundary is enforced
    // manually below, so its own time checks are disabled.
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|_| AuthError::InvalidToken)?;

    let now = now_unix();
    if data.claims.exp <= now {
        return Err(AuthError::InvalidToken);
    }
    if let Some(nbf) = data.claims.nbf {
        if nbf > now {
            return Err(AuthError::InvalidToken);
        }
    }

    Ok(data.claims)
}

/// SHA-256 fingerprint of a presented API key.
pub fn fingerprint(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Leading characters of a key that are safe to show in logs.
pub fn display_prefix(key: &str) -> &str {
    let mut end = KEY_DISPLAY_PREFIX_LEN.min(key.len());
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    &key[..end]
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
