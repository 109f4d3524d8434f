//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, dispatch)
//!     → request.rs (correlation id, client address extraction)
//!     → [routing + security stages decide]
//!     → proxy::forwarder or local handler
//!     → response.rs (wire body shapes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::HttpServer;
