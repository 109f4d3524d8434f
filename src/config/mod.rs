//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (read & parse variables)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reload
//! - Every variable has a development default so a bare `cargo run` works
//! - Validation separates syntactic (parse) from semantic checks
//! - A failed validation is fatal: the listener never binds

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, ConfigError};
pub use schema::{
    CorsConfig, Environment, GatewayConfig, JwtConfig, RateLimitConfig, RedisConfig,
    ServicesConfig,
};
