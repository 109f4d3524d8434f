//! Edge request router for the captcha platform.
//!
//! A single long-running process that terminates client HTTP connections,
//! authenticates callers (signed bearer token or opaque API key), enforces
//! per-client rate limits, and forwards requests to the identity or solver
//! service over pooled connections with bounded timeouts.
//!
//! # Request pipeline
//! ```text
//!          ┌──────────────────── ordered stages ─────────────────────┐
//! Client → │ AccessLog → CorrelationID → CORS → SecurityHeaders      │
//!          │   → Recover → Resolve → RateLimit → Authenticate        │ → Upstream
//!          │   → Forward                                             │
//!          └─────────────────────────────────────────────────────────┘
//!                                                          ↑
//!                                         one of: identity | solver
//! ```
//! Any stage may short-circuit with a complete response; every response the
//! gateway writes carries the correlation id and the security header set.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
