//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against exact or prefix patterns
//! - Match a request method against an entry's method set
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefix patterns end in `/` so `/api/v1/api-keys/` cannot swallow
//!   `/api/v1/api-keysfoo`

use axum::http::Method;

/// A path condition on a route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    /// The full path must be identical.
    Exact(&'static str),
    /// The path must start with the given prefix.
    Prefix(&'static str),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == *p,
            Self::Prefix(p) => path.starts_with(p),
        }
    }
}

pub fn method_matches(methods: &[Method], method: &Method) -> bool {
    methods.iter().any(|m| m == method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_identity() {
        let p = PathPattern::Exact("/api/v1/auth/login");
        assert!(p.matches("/api/v1/auth/login"));
        assert!(!p.matches("/api/v1/auth/login/"));
        assert!(!p.matches("/api/v1/auth/logins"));
    }

    #[test]
    fn prefix_matches_descendants_only() {
        let p = PathPattern::Prefix("/api/v1/api-keys/");
        assert!(p.matches("/api/v1/api-keys/42"));
        assert!(p.matches("/api/v1/api-keys/42/extra"));
        assert!(!p.matches("/api/v1/api-keys"));
        assert!(!p.matches("/api/v1/api-keysx"));
    }

    #[test]
    fn method_set_membership() {
        let methods = [Method::GET, Method::PUT];
        assert!(method_matches(&methods, &Method::GET));
        assert!(!method_matches(&methods, &Method::POST));
    }
}
