//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the compiled route table
//! - Resolve (method, path) to an entry, first match wins
//! - Short-circuit unmatched requests with 404 before any other stage
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over a small fixed table
//! - Explicit no-match rather than a silent default target

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::routing::matcher::{method_matches, PathPattern};

/// Upstream service a route forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Identity,
    Solver,
}

/// Authentication requirement of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// No credentials required.
    Open,
    /// A verified bearer token is required.
    BearerRequired,
    /// An API key is accepted; otherwise a bearer token is required.
    BearerOrApiKey,
}

/// One row of the route table.
#[derive(Debug)]
pub struct RouteEntry {
    pub methods: &'static [Method],
    pub pattern: PathPattern,
    pub target: Target,
    pub policy: AuthPolicy,
}

/// The matched entry, attached to the request for downstream stages.
#[derive(Debug, Clone, Copy)]
pub struct MatchedRoute(pub &'static RouteEntry);

/// The full inbound surface of the gateway. Order matters: first match wins.
static DEFAULT_ROUTES: &[RouteEntry] = &[
    // Account flows, open: the identity service authenticates these itself.
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/auth/register"),
        target: Target::Identity,
        policy: AuthPolicy::Open,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/auth/login"),
        target: Target::Identity,
        policy: AuthPolicy::Open,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/auth/refresh"),
        target: Target::Identity,
        policy: AuthPolicy::Open,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/auth/logout"),
        target: Target::Identity,
        policy: AuthPolicy::Open,
    },
    // Profile management.
    RouteEntry {
        methods: &[Method::GET, Method::PUT],
        pattern: PathPattern::Exact("/api/v1/auth/me"),
        target: Target::Identity,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::PUT],
        pattern: PathPattern::Exact("/api/v1/auth/me/password"),
        target: Target::Identity,
        policy: AuthPolicy::BearerRequired,
    },
    // API key management.
    RouteEntry {
        methods: &[Method::GET, Method::POST],
        pattern: PathPattern::Exact("/api/v1/api-keys"),
        target: Target::Identity,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::DELETE],
        pattern: PathPattern::Prefix("/api/v1/api-keys/"),
        target: Target::Identity,
        policy: AuthPolicy::BearerRequired,
    },
    // Solving, reachable with either credential kind.
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/captcha/solve"),
        target: Target::Solver,
        policy: AuthPolicy::BearerOrApiKey,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/captcha/solve/batch"),
        target: Target::Solver,
        policy: AuthPolicy::BearerOrApiKey,
    },
    // Model and training management.
    RouteEntry {
        methods: &[Method::GET],
        pattern: PathPattern::Exact("/api/v1/captcha/models"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/captcha/models/upload"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::POST],
        pattern: PathPattern::Exact("/api/v1/captcha/train"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::GET],
        pattern: PathPattern::Prefix("/api/v1/captcha/train/"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::GET],
        pattern: PathPattern::Exact("/api/v1/captcha/logs"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
    RouteEntry {
        methods: &[Method::GET],
        pattern: PathPattern::Exact("/api/v1/captcha/stats"),
        target: Target::Solver,
        policy: AuthPolicy::BearerRequired,
    },
];

/// The compiled route table.
#[derive(Debug, Clone, Copy)]
pub struct RouteTable {
    entries: &'static [RouteEntry],
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: DEFAULT_ROUTES,
        }
    }

    /// Resolve a request to a route entry. First match wins.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&'static RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.pattern.matches(path) && method_matches(e.methods, method))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that resolves the route and attaches it to the request, or
/// rejects with 404 before the limiter and authenticator run.
pub async fn resolve_route(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.routes.resolve(req.method(), req.uri().path()) {
        Some(route) => {
            req.extensions_mut().insert(MatchedRoute(route));
            next.run(req).await
        }
        None => {
            tracing::debug!(
                method = %req.method(),
                path = req.uri().path(),
                "No route matched"
            );
            GatewayError::NotFound.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_auth_routes_resolve() {
        let table = RouteTable::new();
        for path in [
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/auth/logout",
        ] {
            let entry = table.resolve(&Method::POST, path).expect(path);
            assert_eq!(entry.target, Target::Identity);
            assert_eq!(entry.policy, AuthPolicy::Open);
        }
    }

    #[test]
    fn profile_routes_require_bearer() {
        let table = RouteTable::new();
        let entry = table.resolve(&Method::GET, "/api/v1/auth/me").unwrap();
        assert_eq!(entry.policy, AuthPolicy::BearerRequired);

        let entry = table.resolve(&Method::PUT, "/api/v1/auth/me/password").unwrap();
        assert_eq!(entry.target, Target::Identity);
    }

    #[test]
    fn api_key_deletion_matches_by_prefix() {
        let table = RouteTable::new();
        let entry = table.resolve(&Method::DELETE, "/api/v1/api-keys/42").unwrap();
        assert_eq!(entry.target, Target::Identity);
        assert_eq!(entry.policy, AuthPolicy::BearerRequired);

        assert!(table.resolve(&Method::DELETE, "/api/v1/api-keys").is_none());
    }

    #[test]
    fn solve_routes_accept_api_keys() {
        let table = RouteTable::new();
        for path in ["/api/v1/captcha/solve", "/api/v1/captcha/solve/batch"] {
            let entry = table.resolve(&Method::POST, path).expect(path);
            assert_eq!(entry.target, Target::Solver);
            assert_eq!(entry.policy, AuthPolicy::BearerOrApiKey);
        }
    }

    #[test]
    fn solver_management_routes_resolve() {
        let table = RouteTable::new();
        assert!(table.resolve(&Method::GET, "/api/v1/captcha/models").is_some());
        assert!(table
            .resolve(&Method::POST, "/api/v1/captcha/models/upload")
            .is_some());
        assert!(table.resolve(&Method::POST, "/api/v1/captcha/train").is_some());
        assert!(table
            .resolve(&Method::GET, "/api/v1/captcha/train/job-7")
            .is_some());
        assert!(table.resolve(&Method::GET, "/api/v1/captcha/logs").is_some());
        assert!(table.resolve(&Method::GET, "/api/v1/captcha/stats").is_some());
    }

    #[test]
    fn wrong_method_is_no_match() {
        let table = RouteTable::new();
        assert!(table.resolve(&Method::GET, "/api/v1/auth/login").is_none());
        assert!(table.resolve(&Method::DELETE, "/api/v1/captcha/solve").is_none());
    }

    #[test]
    fn unknown_paths_are_no_match() {
        let table = RouteTable::new();
        assert!(table.resolve(&Method::GET, "/").is_none());
        assert!(table.resolve(&Method::GET, "/api/v1").is_none());
        assert!(table.resolve(&Method::GET, "/api/v2/auth/me").is_none());
        assert!(table.resolve(&Method::POST, "/api/v1/captcha/solved").is_none());
    }
}
