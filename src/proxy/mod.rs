//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! matched request
//!     → forwarder.rs (rebuild URI on the target's authority)
//!     → strip hop-by-hop headers, inject correlation + principal headers
//!     → pooled client call with a hard deadline
//!     → relay status, headers, and body stream — or 502
//! ```
//!
//! # Design Decisions
//! - One pooled client is created at startup and shared by both targets;
//!   a per-request pool would defeat keep-alive
//! - The `/api/v1` path prefix is preserved verbatim; upstreams see the
//!   same paths the client sent
//! - Transport failures never leak upstream error text to clients

pub mod forwarder;

pub use forwarder::{build_client, Forwarder, HttpClient, InvalidUpstream};
