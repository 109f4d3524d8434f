//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     init logging → load config → select limiter backend → build server
//!     → probe upstreams → bind listener → serve
//!
//! Shutdown:
//!     SIGINT/SIGTERM (signals.rs) → Shutdown::trigger (shutdown.rs)
//!     → stop accepting → drain in-flight up to 30 s → exit 0
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and exits non-zero
//! - Shutdown is broadcast so background tasks stop with the listener
//! - The drain deadline is hard: past it, the process exits with a warning

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
