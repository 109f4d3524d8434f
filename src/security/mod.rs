//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin policy, preflight short-circuit)
//!     → headers.rs (security response headers)
//!     → rate_limit.rs (per-client window allowance)
//!     → auth.rs (route policy: bearer / API key / open)
//!     → limits.rs (inbound body ceiling, applied by the forwarder)
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before authentication so high-volume abusers never
//!   exercise the signature check
//! - Authentication failures never reach an upstream
//! - The plaintext API key is never logged; only its SHA-256 fingerprint and
//!   an 11-character display prefix appear in observability

pub mod auth;
pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use auth::Principal;
pub use rate_limit::{Decision, RateLimiter};
