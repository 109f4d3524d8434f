//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (table lookup, first match wins)
//!     → matcher.rs (exact / prefix evaluation)
//!     → Matched entry {target, auth policy} or explicit no-match (404)
//! ```
//!
//! # Design Decisions
//! - The table is static: the product surface is fixed, not configured
//! - No regex in the hot path (exact and prefix matching only)
//! - Deterministic: same (method, path) always resolves the same entry
//! - An unmatched request is rejected before rate limiting or auth

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{AuthPolicy, MatchedRoute, RouteEntry, RouteTable, Target};
