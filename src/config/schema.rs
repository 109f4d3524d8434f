//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All values come from the environment; defaults match the development
//! deployment of the platform.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Development fallback signing secret. Long enough to pass validation so a
/// local gateway starts without any environment set; production deployments
/// override it via `JWT_SECRET`.
pub const DEV_JWT_SECRET: &str = "your-secret-key-min-32-characters-long";

/// Root configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port for the single HTTP listener.
    pub port: u16,

    /// Deployment environment; affects HSTS and log format.
    pub environment: Environment,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Bearer-token verification settings.
    pub jwt: JwtConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Per-client window allowance.
    pub rate_limit: RateLimitConfig,

    /// Shared counter store; `None` selects the in-process limiter.
    pub redis: Option<RedisConfig>,

    /// Upstream service base URLs.
    pub services: ServicesConfig,

    /// Inbound body ceiling in bytes; `None` streams bodies through.
    pub max_body_bytes: Option<usize>,

    /// Peers whose `X-Forwarded-For` is honored for the client key.
    pub trusted_proxies: Vec<IpAddr>,

    /// Prometheus exporter bind address; `None` disables the exporter.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Development,
            log_level: "info".to_string(),
            jwt: JwtConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            redis: None,
            services: ServicesConfig::default(),
            max_body_bytes: None,
            trusted_proxies: Vec::new(),
            metrics_addr: None,
        }
    }
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Anything that is not exactly `production` is treated as development.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Bearer-token verification settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC signing secret shared with the identity service. Must be at
    /// least 32 bytes.
    pub secret: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
        }
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `*` matches any origin.
    pub allowed_origins: Vec<String>,

    /// Methods advertised on preflight responses.
    pub allowed_methods: Vec<String>,

    /// Request headers advertised on preflight responses.
    pub allowed_headers: Vec<String>,
}

impl CorsConfig {
    pub fn methods_header(&self) -> String {
        self.allowed_methods.join(", ")
    }

    pub fn headers_header(&self) -> String {
        self.allowed_headers.join(", ")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"]
                .map(String::from)
                .to_vec(),
            allowed_headers: [
                "Accept",
                "Authorization",
                "Content-Type",
                "X-API-Key",
                "X-Request-ID",
                "X-Requested-With",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Per-client window allowance.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client key.
    pub requests: u32,

    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Shared counter store connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u8,
}

impl RedisConfig {
    /// Connection URL understood by the redis client.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

/// Upstream service base URLs.
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Identity service (registration, login, tokens, API keys).
    pub auth_url: String,

    /// Solver service (captcha inference, models, training).
    pub captcha_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:8081".to_string(),
            captcha_url: "http://localhost:8082".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_formats() {
        let mut cfg = RedisConfig::default();
        assert_eq!(cfg.url(), "redis://localhost:6379/0");

        cfg.password = "hunter2".to_string();
        cfg.db = 3;
        assert_eq!(cfg.url(), "redis://:hunter2@localhost:6379/3");
    }

    #[test]
    fn environment_parse_defaults_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PRODUCTION"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn dev_secret_is_long_enough() {
        assert!(DEV_JWT_SECRET.len() >= 32);
    }
}
