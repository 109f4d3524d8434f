//! Configuration validation logic.

use url::Url;

use crate::config::schema::GatewayConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a GatewayConfig for semantic correctness.
///
/// All problems are collected so a misconfigured deployment surfaces every
/// mistake in one startup failure.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // The signing secret guards every protected route.
    if config.jwt.secret.len() < 32 {
        errors.push(ValidationError(
            "JWT_SECRET must be at least 32 bytes".to_string(),
        ));
    }

    if config.rate_limit.requests == 0 {
        errors.push(ValidationError(
            "RATE_LIMIT_REQUESTS must be greater than zero".to_string(),
        ));
    }
    if config.rate_limit.window.is_zero() {
        errors.push(ValidationError(
            "RATE_LIMIT_WINDOW_SECONDS must be greater than zero".to_string(),
        ));
    }

    for (name, value) in [
        ("AUTH_SERVICE_URL", &config.services.auth_url),
        ("CAPTCHA_SERVICE_URL", &config.services.captcha_url),
    ] {
        match Url::parse(value) {
            Ok(url) if (url.scheme() == "http" || url.scheme() == "https") && url.has_host() => {}
            _ => errors.push(ValidationError(format!(
                "{} is not a valid http(s) URL: '{}'",
                name, value
            ))),
        }
    }

    if config.max_body_bytes == Some(0) {
        errors.push(ValidationError(
            "GATEWAY_MAX_BODY_BYTES must be greater than zero when set".to_string(),
        ));
    }

    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError(
            "CORS_ORIGINS must contain at least one origin".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
