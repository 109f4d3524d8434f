//! Configuration loading from the process environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{
    CorsConfig, Environment, GatewayConfig, JwtConfig, RateLimitConfig, RedisConfig,
    ServicesConfig, DEV_JWT_SECRET,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate the gateway configuration from the environment.
pub fn load() -> Result<GatewayConfig, ConfigError> {
    let config = GatewayConfig {
        port: get_env_parsed("GATEWAY_PORT", 8080),
        environment: Environment::parse(&get_env("GATEWAY_ENV", "development")),
        log_level: get_env("LOG_LEVEL", "info"),

        jwt: JwtConfig {
            secret: get_env("JWT_SECRET", DEV_JWT_SECRET),
        },

        cors: CorsConfig {
            allowed_origins: get_env_list("CORS_ORIGINS", &["http://localhost:3000"]),
            ..CorsConfig::default()
        },

        rate_limit: RateLimitConfig {
            requests: get_env_parsed("RATE_LIMIT_REQUESTS", 100),
            window: Duration::from_secs(get_env_parsed("RATE_LIMIT_WINDOW_SECONDS", 60)),
        },

        redis: load_redis(),

        services: ServicesConfig {
            auth_url: get_env("AUTH_SERVICE_URL", "http://localhost:8081"),
            captcha_url: get_env("CAPTCHA_SERVICE_URL", "http://localhost:8082"),
        },

        max_body_bytes: env::var("GATEWAY_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok()),

        trusted_proxies: load_trusted_proxies(),

        metrics_addr: load_metrics_addr(),
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// The counter store is only used when `REDIS_HOST` is explicitly set;
/// otherwise the gateway runs with the in-process limiter.
fn load_redis() -> Option<RedisConfig> {
    let host = env::var("REDIS_HOST").ok().filter(|h| !h.is_empty())?;
    Some(RedisConfig {
        host,
        port: get_env_parsed("REDIS_PORT", 6379),
        password: get_env("REDIS_PASSWORD", ""),
        db: get_env_parsed("REDIS_DB", 0),
    })
}

fn load_trusted_proxies() -> Vec<std::net::IpAddr> {
    let raw = match env::var("TRUSTED_PROXIES") {
        Ok(v) if !v.is_empty() => v,
        _ => return Vec::new(),
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = s, "Ignoring unparsable TRUSTED_PROXIES entry");
                None
            }
        })
        .collect()
}

fn load_metrics_addr() -> Option<SocketAddr> {
    let raw = env::var("GATEWAY_METRICS_ADDR").ok().filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            tracing::warn!(value = raw, "Ignoring unparsable GATEWAY_METRICS_ADDR");
            None
        }
    }
}

// Environment helpers

fn get_env(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn get_env_parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_gateway_env() {
        for key in [
            "GATEWAY_PORT",
            "GATEWAY_ENV",
            "LOG_LEVEL",
            "JWT_SECRET",
            "CORS_ORIGINS",
            "RATE_LIMIT_REQUESTS",
            "RATE_LIMIT_WINDOW_SECONDS",
            "REDIS_HOST",
            "REDIS_PORT",
            "REDIS_PASSWORD",
            "REDIS_DB",
            "AUTH_SERVICE_URL",
            "CAPTCHA_SERVICE_URL",
            "GATEWAY_MAX_BODY_BYTES",
            "TRUSTED_PROXIES",
            "GATEWAY_METRICS_ADDR",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_with_empty_environment() {
        clear_gateway_env();
        let config = load().expect("default config must validate");
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert!(config.redis.is_none());
        assert!(config.max_body_bytes.is_none());
        assert_eq!(config.services.auth_url, "http://localhost:8081");
    }

    #[test]
    #[serial]
    fn environment_overrides_are_honored() {
        clear_gateway_env();
        env::set_var("GATEWAY_PORT", "9090");
        env::set_var("GATEWAY_ENV", "production");
        env::set_var("CORS_ORIGINS", "https://a.example, https://b.example");
        env::set_var("RATE_LIMIT_REQUESTS", "7");
        env::set_var("REDIS_HOST", "redis.internal");
        env::set_var("GATEWAY_MAX_BODY_BYTES", "1048576");

        let config = load().expect("config must validate");
        assert_eq!(config.port, 9090);
        assert!(config.environment.is_production());
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rate_limit.requests, 7);
        assert_eq!(config.redis.as_ref().map(|r| r.host.as_str()), Some("redis.internal"));
        assert_eq!(config.max_body_bytes, Some(1_048_576));

        clear_gateway_env();
    }

    #[test]
    #[serial]
    fn short_secret_fails_load() {
        clear_gateway_env();
        env::set_var("JWT_SECRET", "too-short");

        let err = load().expect_err("short secret must fail");
        assert!(err.to_string().contains("JWT_SECRET"));

        clear_gateway_env();
    }

    #[test]
    #[serial]
    fn unparsable_values_fall_back_to_defaults() {
        clear_gateway_env();
        env::set_var("GATEWAY_PORT", "not-a-port");
        env::set_var("RATE_LIMIT_REQUESTS", "many");

        let config = load().expect("config must validate");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit.requests, 100);

        clear_gateway_env();
    }
}
